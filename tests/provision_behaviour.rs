//! Behavioural scenarios for executing provisioning plans.

mod provision;
