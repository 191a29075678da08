//! The extraction pipeline.
//!
//! `load()` gathers lifted IR (bundles, or sources through a registered
//! compiler); `project()` runs the state machine: diff-scan by content
//! hash, stale deletion with an inbound-call side table, per-method
//! AST → CFG → PDG builds inside staging buffers, then call linking and
//! side-table replay. The association state lives for exactly one
//! `project()` call.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::builders::{
    build_cfg, build_method, build_pdg, CallGraphOracle, CallTarget, ChaOracle, MethodDelta,
};
use crate::config::{CallGraphAlg, ExtractorConfig};
use crate::driver::Driver;
use crate::error::{CpgError, Result};
use crate::graph::CpgNode;
use crate::ir::{IrClass, IrMethod, IrProgram};
use crate::schema::{values, EdgeKind, NodeKind};

/// Compiles `.java` sources into lifted IR. The compiler itself is an
/// external collaborator; this is its only contact with the core.
pub trait SourceCompiler: Send + Sync {
    fn compile(&self, sources: &[PathBuf], out_dir: &Path) -> Result<IrProgram>;
}

/// Statistics from one `project()` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectStats {
    pub files_built: usize,
    pub files_skipped: usize,
    pub methods_built: usize,
    pub call_edges: usize,
    pub schema_failures: usize,
}

impl ProjectStats {
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} files built", self.files_built),
            format!("{} unchanged", self.files_skipped),
            format!("{} methods", self.methods_built),
            format!("{} call edges", self.call_edges),
        ];
        if self.schema_failures > 0 {
            parts.push(format!("{} methods failed schema checks", self.schema_failures));
        }
        parts.join(", ")
    }
}

#[derive(Debug)]
struct PendingCall {
    caller: i64,
    full_name: String,
    signature: String,
}

/// Process-local state for one `project()` call: the cross-method
/// association maps and the pending-call side table.
#[derive(Default)]
struct ExtractionCtx {
    /// `(fullName, signature)` → METHOD node id.
    methods: FxHashMap<(String, String), i64>,
    /// `(type fullName, field name)` → MEMBER node id.
    members: FxHashMap<(String, String), i64>,
    /// `(fullName, signature)` → CALL node ids in site order.
    call_sites: FxHashMap<(String, String), Vec<i64>>,
    /// Saved inbound CALL edges awaiting replay.
    pending_calls: Vec<PendingCall>,
    /// Field identifiers awaiting member resolution.
    pending_field_refs: Vec<(i64, String, String)>,
    /// NAMESPACE_BLOCK fullName → node id.
    namespaces: FxHashMap<String, i64>,
    /// Monotonic child-order counter per structural parent id.
    orders: FxHashMap<i64, i64>,
}

impl ExtractionCtx {
    /// Next AST child order under a structural parent. Seeded from the
    /// highest surviving child order on first touch and monotonic from
    /// there, so a rebuild can never collide with a sibling that
    /// another file still owns.
    fn child_order<D: Driver>(&mut self, driver: &D, parent: &CpgNode) -> Result<i64> {
        if !self.orders.contains_key(&parent.id) {
            let hood = driver.get_neighbours(parent)?;
            let highest = hood
                .edges()
                .iter()
                .filter(|e| e.src == parent.id && e.kind == EdgeKind::Ast)
                .filter_map(|e| hood.node(e.dst))
                .map(|child| child.order())
                .max()
                .unwrap_or(0);
            self.orders.insert(parent.id, highest.max(0));
        }
        let counter = self.orders.entry(parent.id).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

/// A persisted-node handle for edge operations addressed by id.
fn stub(kind: NodeKind, id: i64) -> CpgNode {
    CpgNode::new(kind).with_id(id)
}

/// The extractor: a driver, a configuration, and the currently loaded
/// program.
pub struct Extractor<D: Driver> {
    driver: D,
    config: ExtractorConfig,
    program: IrProgram,
    spark_oracle: Option<Box<dyn CallGraphOracle>>,
    compiler: Option<Box<dyn SourceCompiler>>,
}

impl<D: Driver> Extractor<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            config: ExtractorConfig::default(),
            program: IrProgram::default(),
            spark_oracle: None,
            compiler: None,
        }
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the points-to oracle backing `CallGraphAlg::Spark`.
    pub fn with_spark_oracle(mut self, oracle: Box<dyn CallGraphOracle>) -> Self {
        self.spark_oracle = Some(oracle);
        self
    }

    pub fn with_compiler(mut self, compiler: Box<dyn SourceCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Load an IR bundle, a `.java` source (through the registered
    /// compiler), or a directory of either. The loaded set accumulates
    /// until `project()` consumes it; on failure nothing is added.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(CpgError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        if path.is_dir() {
            let mut bundles = Vec::new();
            let mut sources = Vec::new();
            for entry in WalkDir::new(path) {
                let entry = entry.map_err(|e| CpgError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match entry.path().extension().and_then(|ext| ext.to_str()) {
                    Some("json") => bundles.push(entry.path().to_path_buf()),
                    Some("java") => sources.push(entry.path().to_path_buf()),
                    _ => {}
                }
            }
            bundles.sort();
            sources.sort();
            for bundle in &bundles {
                self.load_bundle(bundle)?;
            }
            if !sources.is_empty() {
                self.compile_sources(&sources)?;
            }
            return Ok(());
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => self.load_bundle(path),
            Some("java") => self.compile_sources(&[path.to_path_buf()]),
            _ => Err(CpgError::Config(format!(
                "unsupported input type: {}",
                path.display()
            ))),
        }
    }

    /// Programmatic equivalent of `load`.
    pub fn load_program(&mut self, program: IrProgram) {
        self.program.classes.extend(program.classes);
    }

    fn load_bundle(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let program: IrProgram = serde_json::from_str(&text).map_err(|e| CpgError::Compile {
            message: format!("malformed IR bundle {}: {e}", path.display()),
        })?;
        debug!(bundle = %path.display(), classes = program.classes.len(), "loaded IR bundle");
        self.program.classes.extend(program.classes);
        Ok(())
    }

    fn compile_sources(&mut self, sources: &[PathBuf]) -> Result<()> {
        let Some(compiler) = &self.compiler else {
            return Err(CpgError::Config(
                "source inputs require a registered compiler".to_string(),
            ));
        };
        std::fs::create_dir_all(&self.config.compile_dir)?;
        let program = compiler.compile(sources, &self.config.compile_dir)?;
        info!(sources = sources.len(), classes = program.classes.len(), "compiled sources");
        self.program.classes.extend(program.classes);
        Ok(())
    }

    /// Project the loaded program into the driver's store.
    pub fn project(&mut self) -> Result<ProjectStats> {
        let mut stats = ProjectStats::default();
        if self.program.classes.is_empty() {
            debug!("nothing loaded, projection is a no-op");
            return Ok(stats);
        }
        if self.config.call_graph_alg == CallGraphAlg::Spark && self.spark_oracle.is_none() {
            return Err(CpgError::Config(
                "SPARK selected but no points-to oracle is registered".to_string(),
            ));
        }

        self.ensure_meta_data()?;
        let mut ctx = ExtractionCtx::default();

        // DIFF_SCAN: compare content hashes against the structure snapshot.
        let structure = self.driver.get_program_structure()?;
        let mut plan: Vec<(usize, String)> = Vec::new();
        let mut stale: Vec<CpgNode> = Vec::new();
        let mut seen: FxHashMap<String, String> = FxHashMap::default();
        for (index, class) in self.program.classes.iter().enumerate() {
            let hash = class.content_hash()?;
            if let Some(previous) = seen.get(&class.file_name) {
                if *previous != hash {
                    warn!(
                        file = %class.file_name,
                        "conflicting class with the same file name in one batch; first wins"
                    );
                }
                stats.files_skipped += 1;
                continue;
            }
            seen.insert(class.file_name.clone(), hash.clone());
            let existing = structure
                .nodes_of_kind(NodeKind::File)
                .into_iter()
                .find(|f| f.name() == Some(class.file_name.as_str()))
                .cloned();
            match existing {
                Some(file) if file.hash() == Some(hash.as_str()) => {
                    debug!(file = %class.file_name, "hash unchanged, skipping");
                    stats.files_skipped += 1;
                }
                Some(file) => {
                    stale.push(file);
                    plan.push((index, hash));
                }
                None => plan.push((index, hash)),
            }
        }

        // DELETE_STALE, saving inbound CALL edges for replay.
        for file in &stale {
            Self::delete_stale_file(&self.driver, file, &mut ctx)?;
        }

        // Refresh the structure snapshot after deletions.
        let structure = self.driver.get_program_structure()?;
        for block in structure.nodes_of_kind(NodeKind::NamespaceBlock) {
            if let Some(full_name) = block.full_name() {
                ctx.namespaces.insert(full_name.to_string(), block.id);
            }
        }

        // BUILDING_CPG: lower per class (parallel over the threshold),
        // merge serially into the driver.
        let program = &self.program;
        let lowered: Vec<(usize, String, Vec<Result<MethodDelta>>)> =
            if plan.len() > self.config.parallel_threshold {
                info!(classes = plan.len(), "lowering classes in parallel");
                plan.par_iter()
                    .map(|(index, hash)| {
                        (*index, hash.clone(), lower_class(&program.classes[*index]))
                    })
                    .collect()
            } else {
                plan.iter()
                    .map(|(index, hash)| {
                        (*index, hash.clone(), lower_class(&program.classes[*index]))
                    })
                    .collect()
            };
        for (index, hash, deltas) in lowered {
            let class = &self.program.classes[index];
            Self::merge_class(&self.driver, class, &hash, deltas, &mut ctx, &mut stats)?;
        }

        // LINKING_CALLS over the freshly built methods, then replay the
        // saved inbound edges.
        match self.config.call_graph_alg {
            CallGraphAlg::None => {}
            CallGraphAlg::Cha => {
                let oracle = ChaOracle::new(&self.program);
                Self::link_calls(&self.driver, &oracle, &mut ctx, &mut stats)?;
            }
            CallGraphAlg::Spark => {
                let oracle = self
                    .spark_oracle
                    .as_deref()
                    .expect("checked before the pipeline started");
                Self::link_calls(&self.driver, oracle, &mut ctx, &mut stats)?;
            }
        }
        Self::resolve_field_refs(&self.driver, &mut ctx)?;
        Self::replay_pending(&self.driver, &mut ctx, &mut stats)?;

        info!(summary = %stats.summary(), "projection finished");
        Ok(stats)
    }

    fn ensure_meta_data(&self) -> Result<()> {
        let graph = self.driver.get_whole_graph()?;
        if graph.nodes_of_kind(NodeKind::MetaData).is_empty() {
            let mut meta = CpgNode::meta_data();
            self.driver.add_vertex(&mut meta)?;
        }
        Ok(())
    }

    fn delete_stale_file<DD: Driver>(
        driver: &DD,
        file: &CpgNode,
        ctx: &mut ExtractionCtx,
    ) -> Result<()> {
        debug!(file = ?file.name(), "deleting stale file sub-graph");
        // Walk the namespace chain under the file; type declarations are
        // filtered by filename because namespace blocks are shared
        // between files of the same package.
        let mut type_decls: Vec<CpgNode> = Vec::new();
        let mut visited: FxHashSet<i64> = FxHashSet::default();
        visited.insert(file.id);
        let mut queue: Vec<CpgNode> = vec![file.clone()];
        while let Some(node) = queue.pop() {
            let hood = driver.get_neighbours(&node)?;
            for edge in hood.edges() {
                if edge.src != node.id || edge.kind != EdgeKind::Ast {
                    continue;
                }
                let Some(child) = hood.node(edge.dst) else {
                    continue;
                };
                if !visited.insert(child.id) {
                    continue;
                }
                match child.kind {
                    NodeKind::NamespaceBlock => queue.push(child.clone()),
                    NodeKind::TypeDecl if child.filename() == file.name() => {
                        type_decls.push(child.clone())
                    }
                    _ => {}
                }
            }
        }

        for type_decl in type_decls {
            let hood = driver.get_neighbours(&type_decl)?;
            for edge in hood.edges() {
                if edge.src != type_decl.id {
                    continue;
                }
                let Some(child) = hood.node(edge.dst) else {
                    continue;
                };
                match (edge.kind, child.kind) {
                    (EdgeKind::Ast, NodeKind::Method) => {
                        let full_name = child.full_name().unwrap_or_default().to_string();
                        let signature = child.signature().unwrap_or("()").to_string();
                        Self::record_inbound_calls(driver, child, &full_name, &signature, ctx)?;
                        driver.delete_method(&full_name, &signature)?;
                    }
                    (EdgeKind::Ast, NodeKind::Member | NodeKind::TypeParameter)
                    | (EdgeKind::Binds, NodeKind::Binding) => {
                        driver.delete_vertex(child)?;
                    }
                    _ => {}
                }
            }
            driver.delete_vertex(&type_decl)?;
        }
        driver.delete_vertex(file)?;
        Ok(())
    }

    fn record_inbound_calls<DD: Driver>(
        driver: &DD,
        method: &CpgNode,
        full_name: &str,
        signature: &str,
        ctx: &mut ExtractionCtx,
    ) -> Result<()> {
        let hood = driver.get_neighbours(method)?;
        for edge in hood.edges() {
            if edge.kind == EdgeKind::Call && edge.dst == method.id {
                ctx.pending_calls.push(PendingCall {
                    caller: edge.src,
                    full_name: full_name.to_string(),
                    signature: signature.to_string(),
                });
            }
        }
        Ok(())
    }

    fn merge_class<DD: Driver>(
        driver: &DD,
        class: &IrClass,
        hash: &str,
        deltas: Vec<Result<MethodDelta>>,
        ctx: &mut ExtractionCtx,
        stats: &mut ProjectStats,
    ) -> Result<()> {
        let class_full = class.full_name();
        let mut file = CpgNode::file(&class.file_name).with_hash(hash);
        driver.add_vertex(&mut file)?;
        let file_id = file.id;

        // Namespace chain: the shared root block, then one block per
        // package segment, fullNames being the dotted prefixes.
        let mut chain: Vec<(String, String)> =
            vec![("<global>".to_string(), "<global>".to_string())];
        let mut prefix = String::new();
        for segment in &class.package {
            prefix = if prefix.is_empty() {
                segment.clone()
            } else {
                format!("{prefix}.{segment}")
            };
            chain.push((segment.clone(), prefix.clone()));
        }
        let mut parent = file;
        for (name, full_name) in &chain {
            let mut block = match ctx.namespaces.get(full_name) {
                Some(&id) => stub(NodeKind::NamespaceBlock, id),
                None => {
                    let order = ctx.child_order(driver, &parent)?;
                    let mut node =
                        CpgNode::namespace_block(name, full_name, &class.file_name)
                            .with_order(order);
                    driver.add_vertex(&mut node)?;
                    ctx.namespaces.insert(full_name.clone(), node.id);
                    node
                }
            };
            driver.add_edge(&mut parent, &mut block, EdgeKind::Ast)?;
            parent = block;
        }
        let namespace_full = &chain.last().expect("chain has the root block").1;

        let type_decl_order = ctx.child_order(driver, &parent)?;
        let mut type_decl = CpgNode::type_decl(&class.name, &class_full, &class.file_name)
            .with_ast_parent(namespace_full, values::PARENT_NAMESPACE_BLOCK)
            .with_order(type_decl_order);
        driver.add_vertex(&mut type_decl)?;
        driver.add_edge(&mut parent, &mut type_decl, EdgeKind::Ast)?;

        let mut child_order = 1i64;
        for field in &class.fields {
            let mut member = CpgNode::new(NodeKind::Member)
                .with_name(&field.name)
                .with_code(&format!("{} {}", field.type_full_name, field.name))
                .with_type_full_name(&field.type_full_name)
                .with_order(child_order);
            driver.add_vertex(&mut member)?;
            driver.add_edge(&mut type_decl, &mut member, EdgeKind::Ast)?;
            ctx.members
                .insert((class_full.clone(), field.name.clone()), member.id);
            child_order += 1;
        }
        for type_parameter in &class.type_parameters {
            let mut node = CpgNode::new(NodeKind::TypeParameter)
                .with_name(type_parameter)
                .with_order(child_order);
            driver.add_vertex(&mut node)?;
            driver.add_edge(&mut type_decl, &mut node, EdgeKind::Ast)?;
            child_order += 1;
        }

        for (method, delta) in class.methods.iter().zip(deltas) {
            let full_name = method.full_name(class);
            let delta = match delta {
                Ok(delta) => delta,
                Err(e) if e.is_recoverable() => {
                    warn!(method = %full_name, error = %e, "discarding method after schema violation");
                    stats.schema_failures += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            // A stale copy or a phantom head may already exist; save its
            // callers for replay and clear it before rebuilding.
            let head = driver.get_method(&full_name, &method.signature, false)?;
            if let Some(existing) = head.find_method(&full_name, &method.signature) {
                Self::record_inbound_calls(driver, existing, &full_name, &method.signature, ctx)?;
                driver.delete_method(&full_name, &method.signature)?;
            }

            let ids = match flush_delta(driver, &delta) {
                Ok(ids) => ids,
                Err(e) if e.is_recoverable() => {
                    warn!(method = %full_name, error = %e, "rolled back method after driver rejection");
                    stats.schema_failures += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let method_id = ids[delta.method];

            driver.add_edge(&mut type_decl, &mut stub(NodeKind::Method, method_id), EdgeKind::Ast)?;
            driver.add_edge(
                &mut stub(NodeKind::Method, method_id),
                &mut stub(NodeKind::File, file_id),
                EdgeKind::SourceFile,
            )?;
            let mut binding = CpgNode::binding(&method.name, &method.signature);
            driver.add_edge(&mut type_decl, &mut binding, EdgeKind::Binds)?;
            driver.add_edge(&mut binding, &mut stub(NodeKind::Method, method_id), EdgeKind::Ref)?;

            ctx.methods
                .insert((full_name.clone(), method.signature.clone()), method_id);
            let sites = delta.call_sites().iter().map(|&local| ids[local]).collect();
            ctx.call_sites
                .insert((full_name, method.signature.clone()), sites);
            for (node, owner, field) in &delta.field_refs {
                ctx.pending_field_refs
                    .push((ids[*node], owner.clone(), field.clone()));
            }
            stats.methods_built += 1;
        }
        stats.files_built += 1;
        Ok(())
    }

    fn find_stored_method<DD: Driver>(
        driver: &DD,
        full_name: &str,
        signature: &str,
    ) -> Result<Option<i64>> {
        let head = driver.get_method(full_name, signature, false)?;
        Ok(head.find_method(full_name, signature).map(|n| n.id))
    }

    fn link_calls<DD: Driver>(
        driver: &DD,
        oracle: &dyn CallGraphOracle,
        ctx: &mut ExtractionCtx,
        stats: &mut ProjectStats,
    ) -> Result<()> {
        let site_map: Vec<((String, String), Vec<i64>)> = ctx
            .call_sites
            .iter()
            .map(|(key, sites)| (key.clone(), sites.clone()))
            .collect();
        for ((full_name, signature), sites) in site_map {
            for target in oracle.out_edges(&full_name, &signature) {
                let Some(&call_node) = sites.get(target.site) else {
                    warn!(method = %full_name, site = target.site, "oracle site index out of range");
                    continue;
                };
                let target_id = Self::resolve_target(driver, ctx, &target)?;
                driver.add_edge(
                    &mut stub(NodeKind::Call, call_node),
                    &mut stub(NodeKind::Method, target_id),
                    EdgeKind::Call,
                )?;
                stats.call_edges += 1;
            }
        }
        Ok(())
    }

    fn resolve_target<DD: Driver>(
        driver: &DD,
        ctx: &mut ExtractionCtx,
        target: &CallTarget,
    ) -> Result<i64> {
        let key = (target.full_name.clone(), target.signature.clone());
        if let Some(&id) = ctx.methods.get(&key) {
            return Ok(id);
        }
        if let Some(id) = Self::find_stored_method(driver, &target.full_name, &target.signature)? {
            ctx.methods.insert(key, id);
            return Ok(id);
        }
        // The target is declared but has no body anywhere we can see:
        // recover by emitting a phantom head and keep linking.
        let phantom_error = CpgError::PhantomTarget {
            full_name: target.full_name.clone(),
            signature: target.signature.clone(),
        };
        debug!(error = %phantom_error, "emitting phantom method head");
        let (owner, name) = target
            .full_name
            .rsplit_once('.')
            .unwrap_or(("", target.full_name.as_str()));
        let mut phantom = CpgNode::method(name, &target.full_name, &target.signature)
            .with_ast_parent(owner, values::PARENT_TYPE_DECL)
            .with_property("isExternal", true);
        let mut method_return = CpgNode::new(NodeKind::MethodReturn).with_order(1);
        driver.add_edge(&mut phantom, &mut method_return, EdgeKind::Ast)?;
        ctx.methods.insert(key, phantom.id);
        Ok(phantom.id)
    }

    fn resolve_field_refs<DD: Driver>(driver: &DD, ctx: &mut ExtractionCtx) -> Result<()> {
        let pending = std::mem::take(&mut ctx.pending_field_refs);
        for (node, owner, field) in pending {
            match ctx.members.get(&(owner.clone(), field.clone())) {
                Some(&member) => driver.add_edge(
                    &mut stub(NodeKind::FieldIdentifier, node),
                    &mut stub(NodeKind::Member, member),
                    EdgeKind::Ref,
                )?,
                None => debug!(owner = %owner, field = %field, "unresolved member reference"),
            }
        }
        Ok(())
    }

    fn replay_pending<DD: Driver>(
        driver: &DD,
        ctx: &mut ExtractionCtx,
        stats: &mut ProjectStats,
    ) -> Result<()> {
        let pending = std::mem::take(&mut ctx.pending_calls);
        for call in pending {
            let key = (call.full_name.clone(), call.signature.clone());
            let target = match ctx.methods.get(&key).copied() {
                Some(id) => Some(id),
                None => Self::find_stored_method(driver, &call.full_name, &call.signature)?,
            };
            let Some(target_id) = target else {
                // The target never came back; prune rather than dangle.
                debug!(method = %call.full_name, "dropping unresolvable saved call edge");
                continue;
            };
            let mut caller = stub(NodeKind::Call, call.caller);
            if !driver.exists(&caller)? {
                debug!(caller = call.caller, "saved caller no longer exists");
                continue;
            }
            let mut target_node = stub(NodeKind::Method, target_id);
            driver.add_edge(&mut caller, &mut target_node, EdgeKind::Call)?;
            stats.call_edges += 1;
        }
        Ok(())
    }
}

/// Lower every method of a class through the AST, CFG, and PDG passes.
/// Pure with respect to the driver, so classes can lower in parallel.
fn lower_class(class: &IrClass) -> Vec<Result<MethodDelta>> {
    let leading_children = (class.fields.len() + class.type_parameters.len()) as i64;
    class
        .methods
        .iter()
        .enumerate()
        .map(|(index, method)| lower_method(class, method, leading_children + index as i64 + 1))
        .collect()
}

fn lower_method(class: &IrClass, method: &IrMethod, order: i64) -> Result<MethodDelta> {
    let mut delta = build_method(class, method, order)?;
    build_cfg(&mut delta, method)?;
    build_pdg(&mut delta)?;
    Ok(delta)
}

/// Play a staged method into the driver. On any failure every node
/// flushed so far is deleted again, so a rejected method leaves no
/// partial state.
fn flush_delta<D: Driver>(driver: &D, delta: &MethodDelta) -> Result<Vec<i64>> {
    let mut ids: Vec<i64> = Vec::with_capacity(delta.nodes.len());
    for node in &delta.nodes {
        let mut fresh = node.clone();
        match driver.add_vertex(&mut fresh) {
            Ok(id) => ids.push(id),
            Err(e) => {
                rollback(driver, &ids);
                return Err(e);
            }
        }
    }
    for edge in &delta.edges {
        let mut src = stub(delta.node(edge.src).kind, ids[edge.src]);
        let mut dst = stub(delta.node(edge.dst).kind, ids[edge.dst]);
        if let Err(e) = driver.add_edge(&mut src, &mut dst, edge.kind) {
            rollback(driver, &ids);
            return Err(e);
        }
    }
    Ok(ids)
}

fn rollback<D: Driver>(driver: &D, ids: &[i64]) {
    for &id in ids {
        if let Err(e) = driver.delete_vertex(&stub(NodeKind::Unknown, id)) {
            warn!(id, error = %e, "rollback failed to delete staged node");
        }
    }
}
