//! Lifecycle behaviour tests driven through the controller service.

mod bdd_steps;
mod scenarios;
mod test_helpers;
