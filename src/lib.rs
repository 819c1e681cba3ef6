pub mod cli;
pub mod kredenco;
pub mod vault;
