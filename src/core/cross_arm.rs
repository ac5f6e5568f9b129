use getset::{CopyGetters, Getters, MutGetters, Setters};

/// 交叉十字臂结构, 四个方向的臂长, 单方向臂长最长不能超过255
#[derive(Getters, Setters, MutGetters, CopyGetters, Copy, Clone, Debug, Default)]
pub struct CrossArm {
    ///左臂长度
    #[getset(get = "pub", set = "pub")]
    left: u8,
    ///右臂长度
    #[getset(get = "pub", set = "pub")]
    right: u8,
    ///上臂长度
    #[getset(get = "pub", set = "pub")]
    top: u8,
    ///下臂长度
    #[getset(get = "pub", set = "pub")]
    bottom: u8,
}

impl CrossArm {
    /// 横向臂像素数量(包括中心像素本身)
    pub fn horizontal_pixel_count(&self) -> u32 {
        self.left as u32 + self.right as u32 + 1
    }

    /// 纵向臂像素数量(包括中心像素本身)
    pub fn vertical_pixel_count(&self) -> u32 {
        self.top as u32 + self.bottom as u32 + 1
    }

    /// 横向臂起止列(闭区间), 构建时已保证不越过影像边界
    pub fn horizontal_range(&self, x: usize) -> (usize, usize) {
        (x - self.left as usize, x + self.right as usize)
    }

    /// 纵向臂起止行(闭区间), 构建时已保证不越过影像边界
    pub fn vertical_range(&self, y: usize) -> (usize, usize) {
        (y - self.top as usize, y + self.bottom as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::CrossArm;

    #[test]
    fn test_pixel_count_includes_center() {
        let mut arm = CrossArm::default();
        arm.set_left(2).set_right(3).set_top(1).set_bottom(0);
        assert_eq!(arm.horizontal_pixel_count(), 6);
        assert_eq!(arm.vertical_pixel_count(), 2);
        assert_eq!(arm.horizontal_range(10), (8, 13));
        assert_eq!(arm.vertical_range(5), (4, 5));
    }
}
