//! bytegraph-core: code property graph extraction from lifted JVM IR.
//!
//! The crate superimposes the AST, CFG, program-dependence, and call
//! graph of every method into one typed multigraph behind a small
//! storage-driver contract. An external lifter supplies the IR; drivers
//! supply persistence; everything in between lives here.

pub mod builders;
pub mod config;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod ir;
pub mod schema;

pub use builders::{CallGraphOracle, CallTarget, ChaOracle};
pub use config::{CallGraphAlg, ExtractorConfig};
pub use driver::{DiskDriver, Driver, MemoryDriver};
pub use error::{CpgError, Result};
pub use extractor::{Extractor, ProjectStats, SourceCompiler};
pub use graph::{CpgNode, PropertyValue, Subgraph, SubgraphEdge};
pub use ir::IrProgram;
pub use schema::{EdgeKind, NodeKind};
