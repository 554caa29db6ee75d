//! LightGBM model files shared by the unit tests.

pub const BINARY_93: &str = include_str!("../../tests/fixtures/binary_93.txt");
pub const CATEGORICAL: &str = include_str!("../../tests/fixtures/categorical.txt");
pub const MULTICLASS_3: &str = include_str!("../../tests/fixtures/multiclass_3.txt");
pub const POISSON: &str = include_str!("../../tests/fixtures/poisson.txt");
