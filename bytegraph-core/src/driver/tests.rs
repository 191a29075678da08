use super::*;
use crate::error::CpgError;
use crate::graph::CpgNode;
use crate::schema::NodeKind;
use tempfile::tempdir;

fn method_with_body(driver: &dyn Driver) -> (CpgNode, CpgNode, CpgNode) {
    let mut method = CpgNode::method("main", "Foo.main", "void(java.lang.String[])");
    let mut block = CpgNode::new(NodeKind::Block).with_order(2).with_argument_index(0);
    let mut ret = CpgNode::new(NodeKind::MethodReturn)
        .with_code("void")
        .with_order(3);
    driver.add_vertex(&mut method).expect("add method");
    driver.add_edge(&mut method, &mut block, EdgeKind::Ast).expect("ast edge");
    driver.add_edge(&mut method, &mut ret, EdgeKind::Ast).expect("ast edge");
    (method, block, ret)
}

#[test]
fn test_add_vertex_assigns_and_finalises_id() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java");
    assert!(!file.is_persisted());
    let id = driver.add_vertex(&mut file).expect("add vertex");
    assert_eq!(file.id, id);
    assert!(driver.exists(&file).expect("exists"));

    let mut other = CpgNode::file("B.java");
    let other_id = driver.add_vertex(&mut other).expect("add vertex");
    assert!(other_id > id, "ids are monotonic");
}

#[test]
fn test_add_vertex_idempotent() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java").with_hash("aa");
    driver.add_vertex(&mut file).expect("first add");
    let before = driver.get_vertex_ids(0, i64::MAX).expect("ids");
    driver.add_vertex(&mut file).expect("second add");
    let after = driver.get_vertex_ids(0, i64::MAX).expect("ids");
    assert_eq!(before, after);
    assert_eq!(driver.get_whole_graph().expect("graph").node_count(), 1);
}

#[test]
fn test_add_edge_auto_inserts_and_is_idempotent() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java");
    let mut ns = CpgNode::namespace_block("<global>", "<global>", "A.java");
    driver.add_edge(&mut file, &mut ns, EdgeKind::Ast).expect("add edge");
    assert!(file.is_persisted() && ns.is_persisted());
    assert!(driver.edge_exists(&file, &ns, EdgeKind::Ast).expect("edge exists"));

    driver.add_edge(&mut file, &mut ns, EdgeKind::Ast).expect("re-add edge");
    let graph = driver.get_whole_graph().expect("graph");
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn test_schema_violation_fails_closed() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java");
    let mut method = CpgNode::method("m", "A.m", "void()");
    let err = driver
        .add_edge(&mut file, &mut method, EdgeKind::Ast)
        .expect_err("FILE -AST-> METHOD is illegal");
    assert!(matches!(err, CpgError::SchemaViolation { .. }));
    // Nothing was persisted, not even the endpoints.
    assert!(driver.get_whole_graph().expect("graph").is_empty());
}

#[test]
fn test_hand_built_record_missing_a_property_is_rejected() {
    let driver = MemoryDriver::new();
    let mut node = CpgNode::method("m", "A.m", "void()");
    node.properties.remove("fullName");
    let err = driver.add_vertex(&mut node).expect_err("must be rejected");
    assert!(matches!(err, CpgError::MissingProperty { property: "fullName", .. }));
    assert!(driver.get_whole_graph().expect("graph").is_empty());
}

#[test]
fn test_delete_vertex_idempotent() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java");
    driver.add_vertex(&mut file).expect("add");
    driver.delete_vertex(&file).expect("delete");
    driver.delete_vertex(&file).expect("delete again is fine");
    assert!(!driver.exists(&file).expect("exists"));

    // Deleting a builder that was never persisted is a no-op too.
    driver.delete_vertex(&CpgNode::file("B.java")).expect("no-op");
}

#[test]
fn test_get_method_closure_and_head_only() {
    let driver = MemoryDriver::new();
    let (method, mut block, _) = method_with_body(&driver);
    let mut call = CpgNode::new(NodeKind::Call).with_name("ADD");
    driver.add_edge(&mut block, &mut call, EdgeKind::Ast).expect("ast");

    let full = driver
        .get_method("Foo.main", "void(java.lang.String[])", true)
        .expect("get full");
    assert_eq!(full.node_count(), 4);
    assert!(full.contains(call.id));

    let head = driver
        .get_method("Foo.main", "void(java.lang.String[])", false)
        .expect("get head");
    assert!(head.contains(method.id));
    assert!(!head.contains(call.id));
    assert_eq!(head.nodes_of_kind(NodeKind::MethodReturn).len(), 1);

    let missing = driver.get_method("Foo.other", "void()", true).expect("get missing");
    assert!(missing.is_empty());
}

#[test]
fn test_delete_method_preserves_inbound_call_edges() {
    let driver = MemoryDriver::new();
    let (mut method, block, ret) = method_with_body(&driver);
    let mut caller = CpgNode::new(NodeKind::Call).with_name("main");
    driver.add_edge(&mut caller, &mut method, EdgeKind::Call).expect("call edge");

    let before = driver.get_vertex_ids(0, i64::MAX).expect("ids");
    driver
        .delete_method("Foo.main", "void(java.lang.String[])")
        .expect("delete");

    // The whole AST closure is gone, the caller survives.
    for node in [&method, &block, &ret] {
        assert!(!driver.exists(node).expect("exists"));
    }
    assert!(driver.exists(&caller).expect("caller exists"));
    let after = driver.get_vertex_ids(0, i64::MAX).expect("ids");
    assert!(after.is_subset(&before) && after.len() < before.len());

    // Deleting an absent method is a no-op.
    driver.delete_method("Foo.main", "void(java.lang.String[])").expect("no-op");
}

#[test]
fn test_get_program_structure() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java");
    let mut root = CpgNode::namespace_block("<global>", "<global>", "A.java");
    let mut pkg = CpgNode::namespace_block("Foo", "Foo", "A.java");
    let mut td = CpgNode::type_decl("A", "Foo.A", "A.java");
    driver.add_edge(&mut file, &mut root, EdgeKind::Ast).expect("edge");
    driver.add_edge(&mut root, &mut pkg, EdgeKind::Ast).expect("edge");
    driver.add_edge(&mut pkg, &mut td, EdgeKind::Ast).expect("edge");

    let structure = driver.get_program_structure().expect("structure");
    assert_eq!(structure.node_count(), 3, "type decls are not structure");
    assert_eq!(structure.edge_count(), 2);
    assert_eq!(structure.nodes_of_kind(NodeKind::NamespaceBlock).len(), 2);
}

#[test]
fn test_get_neighbours_is_one_hop() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java");
    let mut root = CpgNode::namespace_block("<global>", "<global>", "A.java");
    let mut pkg = CpgNode::namespace_block("Foo", "Foo", "A.java");
    driver.add_edge(&mut file, &mut root, EdgeKind::Ast).expect("edge");
    driver.add_edge(&mut root, &mut pkg, EdgeKind::Ast).expect("edge");

    let hood = driver.get_neighbours(&root).expect("neighbours");
    assert_eq!(hood.node_count(), 3);
    let hood = driver.get_neighbours(&file).expect("neighbours");
    assert_eq!(hood.node_count(), 2, "pkg is two hops from file");
}

#[test]
fn test_clear_resets_allocator() {
    let driver = MemoryDriver::new();
    let mut file = CpgNode::file("A.java");
    driver.add_vertex(&mut file).expect("add");
    driver.clear().expect("clear");
    assert!(driver.get_whole_graph().expect("graph").is_empty());

    let mut again = CpgNode::file("A.java");
    let id = driver.add_vertex(&mut again).expect("add");
    assert_eq!(id, 0, "fresh store allocates from zero");
}

#[test]
fn test_disk_driver_round_trip() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("graph.redb");

    {
        let driver = DiskDriver::open(&path).expect("open");
        let mut file = CpgNode::file("A.java").with_hash("h1");
        let mut ns = CpgNode::namespace_block("<global>", "<global>", "A.java");
        driver.add_edge(&mut file, &mut ns, EdgeKind::Ast).expect("edge");
        method_with_body(&driver);
        drop(driver);
    }

    let driver = DiskDriver::open(&path).expect("reopen");
    let graph = driver.get_whole_graph().expect("graph");
    assert_eq!(graph.node_count(), 5);
    assert_eq!(graph.nodes_of_kind(NodeKind::File)[0].hash(), Some("h1"));
    assert!(graph
        .find_method("Foo.main", "void(java.lang.String[])")
        .is_some());
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn test_disk_driver_deletion_persists() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("graph.redb");

    {
        let driver = DiskDriver::open(&path).expect("open");
        method_with_body(&driver);
        driver
            .delete_method("Foo.main", "void(java.lang.String[])")
            .expect("delete");
    }

    let driver = DiskDriver::open(&path).expect("reopen");
    assert!(driver.get_whole_graph().expect("graph").is_empty());
}

#[test]
fn test_disk_driver_schema_violation_persists_nothing() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("graph.redb");
    {
        let driver = DiskDriver::open(&path).expect("open");
        let mut lit = CpgNode::new(NodeKind::Literal);
        let mut local = CpgNode::new(NodeKind::Local).with_name("a");
        assert!(driver.add_edge(&mut lit, &mut local, EdgeKind::Ref).is_err());
    }
    let driver = DiskDriver::open(&path).expect("reopen");
    assert!(driver.get_whole_graph().expect("graph").is_empty());
}
