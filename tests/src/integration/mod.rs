//! Cross-component custody scenarios.

pub mod fixtures;

#[cfg(test)]
mod churn_flow;
#[cfg(test)]
mod migration_flow;
#[cfg(test)]
mod ragnarok_flow;
#[cfg(test)]
mod slashing_flow;
