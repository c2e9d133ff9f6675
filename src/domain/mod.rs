// Domain layer - Core export types and pure rules

pub mod model;
pub mod rules;
