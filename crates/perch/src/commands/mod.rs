pub mod ami;
pub mod bastion;
pub mod role;
pub mod scan;
pub mod stack;
