use getset::{CopyGetters, Getters, MutGetters, Setters};

/// 像素坐标
#[derive(Getters, Setters, MutGetters, CopyGetters, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
    #[getset(get = "pub", set = "pub")]
    x: usize,
    #[getset(get = "pub", set = "pub")]
    y: usize,
}

impl Point {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}
