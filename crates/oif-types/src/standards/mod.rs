pub mod eip7683;
