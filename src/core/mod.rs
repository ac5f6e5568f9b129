mod cross_arm;
mod option;
mod point;

pub use cross_arm::CrossArm;
pub use option::ADCensusOption;
pub use point::Point;
