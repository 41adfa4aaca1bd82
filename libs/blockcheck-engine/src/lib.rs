pub mod classifier;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod family;
pub mod locator;
pub mod normalizer;
pub mod params;
pub mod patcher;
pub mod primitives;
pub mod runner;
pub mod sandbox;
pub mod scan;


pub use classifier::{classify, classify_family, FamilyFlags};
pub use engine::{execute, ExecutionRequest, SandboxError};
pub use executor::{run_test_suite, SuiteInput};
pub use locator::{extract_function_name, locate, top_level_function_names};
pub use sandbox::{Capability, CapabilityMap};
