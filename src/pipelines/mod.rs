pub mod hybrid_assembly;
pub mod plan;
pub mod stages;
