mod walk;

pub use walk::{SimulatedWalk, WalkConfig, WalkLeg, generate_walk, magnetic_field_for_heading};
