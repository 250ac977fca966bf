pub mod sender;
pub mod receiver;

pub mod aggregator;
pub mod randomizer;
