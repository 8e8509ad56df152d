pub mod device_reputation;
pub mod risk_calculator;

pub use device_reputation::{DeviceReputation, DeviceReputationTracker};
pub use risk_calculator::{RiskCalculator, RiskWeights, RiskWeightsUpdate, SubScores};
