use ndarray::{prelude::*, Zip};
use ndarray_stats::QuantileExt;
use ndhistogram::{axis::UniformNoFlow, ndhistogram, Histogram};

use crate::core::{ADCensusOption, CrossArm, Point};
use crate::error::{self, Error, Result};
use crate::utils::{hamming_distance, median_filter_3x3, pixel_distance, pixel_distance_l1};

use getset::{CopyGetters, Getters};
use log::{debug, trace};

/// 无效视差值, 所有比较必须通过 is_nan() 判断
pub const INVALID_FLOAT: f32 = f32::NAN;
/// 大代价值, 用于越界像素与路径边界
pub const COST_MAX: f32 = 99999.0;
/// 最大臂长
const MAX_ARM_LENGTH: u8 = 255;

#[inline]
fn bgr(image: &ArrayView3<'_, u8>, y: usize, x: usize) -> [u8; 3] {
    [image[(y, x, 0)], image[(y, x, 1)], image[(y, x, 2)]]
}

/// BGR 转亮度
#[inline]
fn luma(p: [u8; 3]) -> u8 {
    (p[2] as f32 * 0.299f32 + p[1] as f32 * 0.587f32 + p[0] as f32 * 0.114f32) as u8
}

/// 计算像素的census序列
///
/// 以像素为中心取 9列 x 7行 窗口, 逐位比较邻域像素与中心像素的亮度,
/// 邻域像素亮度小于中心像素时置1。中心位跳过, 共 62 个有效位。
/// 窗口越过影像边界时坐标按边界截断(边界复制)。
fn census_signature(gray: &ArrayView2<'_, u8>, y: usize, x: usize) -> u64 {
    let (height, width) = gray.dim();
    let center = gray[(y, x)];
    let mut signature = 0u64;
    for dy in -3i32..=3 {
        for dx in -4i32..=4 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let yy = (y as i32 + dy).clamp(0, height as i32 - 1) as usize;
            let xx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
            signature <<= 1;
            if gray[(yy, xx)] < center {
                signature |= 1;
            }
        }
    }
    signature
}

/// 从中心像素沿一个方向延伸十字臂
///
/// 终止规则:
/// 1. 臂长达到 min(L1, 最大臂长)
/// 2. 当前像素与中心像素色差 >= t1
/// 3. 当前像素与前一个像素色差 >= t1 (首个像素除外)
/// 4. 臂长超过 L2 后, 当前像素与中心像素色差 >= t2
/// 5. 影像边界
fn walk_arm(
    image: &ArrayView3<'_, u8>,
    y: usize,
    x: usize,
    dx: i32,
    dy: i32,
    max_length: i32,
    cross_l2: i32,
    cross_t1: i32,
    cross_t2: i32,
) -> u8 {
    let (height, width, _) = image.dim();
    let color0 = bgr(image, y, x);
    let mut color_last = color0;
    let mut len = 0u8;
    for n in 0..max_length {
        let xn = x as i32 + (n + 1) * dx;
        let yn = y as i32 + (n + 1) * dy;
        if xn < 0 || xn >= width as i32 || yn < 0 || yn >= height as i32 {
            break;
        }
        let color = bgr(image, yn as usize, xn as usize);
        let dist1 = pixel_distance(&color, &color0);
        if dist1 >= cross_t1 {
            break;
        }
        if n > 0 && pixel_distance(&color, &color_last) >= cross_t1 {
            break;
        }
        if n + 1 > cross_l2 && dist1 >= cross_t2 {
            break;
        }
        len += 1;
        color_last = color;
    }
    len
}

/// 根据路径上相邻像素的色差选择平滑惩罚参数
#[inline]
fn adaptive_penalty(d1: i32, d2: i32, tso: i32, p1: f32, p2: f32) -> (f32, f32) {
    if d1 < tso && d2 < tso {
        (p1, p2)
    } else if d1 >= tso && d2 >= tso {
        (p1 / 10f32, p2 / 10f32)
    } else {
        (p1 / 4f32, p2 / 4f32)
    }
}

/// 水平方向扫描线优化(左->右 或 右->左)
///
/// 路径首像素直接复制源代价; 其余像素按
/// Lr(p,d) = ( C(p,d) + min( Lr(p-r,d), Lr(p-r,d-1)+P1, Lr(p-r,d+1)+P1, min(Lr(p-r))+P2 ) ) / 2
/// 存储, 不减去前一像素的最小代价。
fn scanline_optimize_horizontal(
    image_left: &ArrayView3<'_, u8>,
    image_right: &ArrayView3<'_, u8>,
    cost_src: &ArrayView3<'_, f32>,
    cost_dst: &mut ArrayViewMut3<'_, f32>,
    option: &ADCensusOption,
    is_forward: bool,
) {
    let (_, width, disp_range) = cost_src.dim();
    let min_disparity = *option.min_disparity();
    let p1 = *option.so_p1();
    let p2 = *option.so_p2();
    let tso = *option.so_tso();
    let direction: i32 = if is_forward { 1 } else { -1 };
    let left = image_left.view();
    let right = image_right.view();
    Zip::indexed(cost_dst.axis_iter_mut(Axis(0)))
        .and(cost_src.axis_iter(Axis(0)))
        .par_for_each(|y, mut dst_row, src_row| {
            let x0 = if is_forward { 0usize } else { width - 1 };
            // 路径首像素: 复制源代价
            dst_row.row_mut(x0).assign(&src_row.row(x0));
            // 路径上前一像素的代价, 首尾各加一个边界哨兵
            let mut cost_last = vec![COST_MAX; disp_range + 2];
            for (k, v) in src_row.row(x0).iter().enumerate() {
                cost_last[k + 1] = *v;
            }
            let mut mincost_last = COST_MAX;
            for v in &cost_last {
                mincost_last = mincost_last.min(*v);
            }
            let mut color_last = bgr(&left, y, x0);
            for step in 1..width {
                let x = (x0 as i32 + step as i32 * direction) as usize;
                let color = bgr(&left, y, x);
                let d1 = pixel_distance(&color, &color_last);
                let mut min_cost = COST_MAX;
                for k in 0..disp_range {
                    let d = min_disparity + k as i32;
                    let xr = x as i32 - d;
                    let mut d2 = d1;
                    // 右视图同名像素及其路径前一像素的色差
                    if xr > 0 && xr < width as i32 - 1 {
                        let color_r = bgr(&right, y, xr as usize);
                        let color_r_last = bgr(&right, y, (xr - direction) as usize);
                        d2 = pixel_distance(&color_r, &color_r_last);
                    }
                    let (p1_adt, p2_adt) = adaptive_penalty(d1, d2, tso, p1, p2);
                    let cost = src_row[(x, k)];
                    let l1 = cost_last[k + 1];
                    let l2 = cost_last[k] + p1_adt;
                    let l3 = cost_last[k + 2] + p1_adt;
                    let l4 = mincost_last + p2_adt;
                    let cost_s = (cost + l1.min(l2).min(l3).min(l4)) / 2f32;
                    dst_row[(x, k)] = cost_s;
                    min_cost = min_cost.min(cost_s);
                }
                mincost_last = min_cost;
                for (k, v) in dst_row.row(x).iter().enumerate() {
                    cost_last[k + 1] = *v;
                }
                color_last = color;
            }
        });
}

/// 竖直方向扫描线优化(上->下 或 下->上)
fn scanline_optimize_vertical(
    image_left: &ArrayView3<'_, u8>,
    image_right: &ArrayView3<'_, u8>,
    cost_src: &ArrayView3<'_, f32>,
    cost_dst: &mut ArrayViewMut3<'_, f32>,
    option: &ADCensusOption,
    is_forward: bool,
) {
    let (height, width, disp_range) = cost_src.dim();
    let min_disparity = *option.min_disparity();
    let p1 = *option.so_p1();
    let p2 = *option.so_p2();
    let tso = *option.so_tso();
    let direction: i32 = if is_forward { 1 } else { -1 };
    let left = image_left.view();
    let right = image_right.view();
    Zip::indexed(cost_dst.axis_iter_mut(Axis(1)))
        .and(cost_src.axis_iter(Axis(1)))
        .par_for_each(|x, mut dst_col, src_col| {
            let y0 = if is_forward { 0usize } else { height - 1 };
            dst_col.row_mut(y0).assign(&src_col.row(y0));
            let mut cost_last = vec![COST_MAX; disp_range + 2];
            for (k, v) in src_col.row(y0).iter().enumerate() {
                cost_last[k + 1] = *v;
            }
            let mut mincost_last = COST_MAX;
            for v in &cost_last {
                mincost_last = mincost_last.min(*v);
            }
            let mut color_last = bgr(&left, y0, x);
            for step in 1..height {
                let y = (y0 as i32 + step as i32 * direction) as usize;
                let color = bgr(&left, y, x);
                let d1 = pixel_distance(&color, &color_last);
                let mut min_cost = COST_MAX;
                for k in 0..disp_range {
                    let d = min_disparity + k as i32;
                    let xr = x as i32 - d;
                    let mut d2 = d1;
                    if xr >= 0 && xr < width as i32 {
                        let yp = (y as i32 - direction) as usize;
                        let color_r = bgr(&right, y, xr as usize);
                        let color_r_last = bgr(&right, yp, xr as usize);
                        d2 = pixel_distance(&color_r, &color_r_last);
                    }
                    let (p1_adt, p2_adt) = adaptive_penalty(d1, d2, tso, p1, p2);
                    let cost = src_col[(y, k)];
                    let l1 = cost_last[k + 1];
                    let l2 = cost_last[k] + p1_adt;
                    let l3 = cost_last[k + 2] + p1_adt;
                    let l4 = mincost_last + p2_adt;
                    let cost_s = (cost + l1.min(l2).min(l3).min(l4)) / 2f32;
                    dst_col[(y, k)] = cost_s;
                    min_cost = min_cost.min(cost_s);
                }
                mincost_last = min_cost;
                for (k, v) in dst_col.row(y).iter().enumerate() {
                    cost_last[k + 1] = *v;
                }
                color_last = color;
            }
        });
}

/// 边缘检测 - Sobel算子
///
/// |grad_x| + |grad_y| 超过阈值的像素标记为边缘, 影像边界一圈不参与。
/// 无效视差值(NaN)按 0 参与梯度计算。
fn edge_detect_with_sobel(source: &ArrayView2<'_, f32>, threshold: f32) -> Array2<bool> {
    let (height, width) = source.dim();
    let mut ret = Array2::<bool>::default((height, width));
    Zip::indexed(&mut ret).par_for_each(|(y, x), edge| {
        if y == 0 || y == height - 1 || x == 0 || x == width - 1 {
            return;
        }
        let p = |yy: usize, xx: usize| {
            let v = source[(yy, xx)];
            if v.is_nan() {
                0f32
            } else {
                v
            }
        };
        let grad_x = (-p(y - 1, x - 1) + p(y - 1, x + 1))
            + (-2f32 * p(y, x - 1) + 2f32 * p(y, x + 1))
            + (-p(y + 1, x - 1) + p(y + 1, x + 1));
        let grad_y = (-p(y - 1, x - 1) - 2f32 * p(y - 1, x) - p(y - 1, x + 1))
            + (p(y + 1, x - 1) + 2f32 * p(y + 1, x) + p(y + 1, x + 1));
        if grad_x.abs() + grad_y.abs() > threshold {
            *edge = true;
        }
    });
    ret
}

/// AD-Census 立体匹配引擎
///
/// 所有缓冲区在构造时一次性分配, 同尺寸影像对可重复调用 matching,
/// 几何尺寸或视差范围变化时调用 reset 重建。
#[derive(Getters, CopyGetters, Debug)]
pub struct ADCensus {
    /// 核线像对影像宽
    #[getset(get_copy = "pub")]
    width: u32,
    /// 核线像对影像高
    #[getset(get_copy = "pub")]
    height: u32,
    /// 算法参数
    #[getset(get = "pub")]
    option: ADCensusOption,
    /// 左图 BGR 数据 (H x W x 3)
    image_left: Array3<u8>,
    /// 右图 BGR 数据 (H x W x 3)
    image_right: Array3<u8>,
    /// 左图census序列
    census_left: Array2<u64>,
    /// 右图census序列
    census_right: Array2<u64>,
    /// 初始代价卷, 扫描线优化时兼作乒乓缓冲
    cost_init: Array3<f32>,
    /// 聚合代价卷, 扫描线优化结束后保存最终代价
    cost_aggr: Array3<f32>,
    /// 单视差层聚合临时缓冲(第一次遍历的输入)
    cost_tmp1: Array2<f32>,
    /// 单视差层聚合临时缓冲(第一次遍历的输出)
    cost_tmp2: Array2<f32>,
    /// 左图十字交叉臂
    cross_arms: Array2<CrossArm>,
    /// 支持区像素数 - 先横向再纵向
    sup_count_hf: Array2<u32>,
    /// 支持区像素数 - 先纵向再横向
    sup_count_vf: Array2<u32>,
    /// 左视差图
    disparity_left: Array2<f32>,
    /// 右视差图
    disparity_right: Array2<f32>,
}

impl ADCensus {
    pub fn new(width: u32, height: u32, option: Option<ADCensusOption>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::new(1001, error::ERROR_1001));
        }
        let option = option.unwrap_or_default();
        let disp_range = *option.max_disparity() - *option.min_disparity();
        if disp_range <= 0 {
            return Err(Error::new(1002, error::ERROR_1002));
        }
        let (h, w, d) = (height as usize, width as usize, disp_range as usize);
        Ok(Self {
            width,
            height,
            option,
            image_left: Array3::zeros((h, w, 3)),
            image_right: Array3::zeros((h, w, 3)),
            census_left: Array2::zeros((h, w)),
            census_right: Array2::zeros((h, w)),
            cost_init: Array3::zeros((h, w, d)),
            cost_aggr: Array3::zeros((h, w, d)),
            cost_tmp1: Array2::zeros((h, w)),
            cost_tmp2: Array2::zeros((h, w)),
            cross_arms: Array2::default((h, w)),
            sup_count_hf: Array2::zeros((h, w)),
            sup_count_vf: Array2::zeros((h, w)),
            disparity_left: Array2::zeros((h, w)),
            disparity_right: Array2::zeros((h, w)),
        })
    }

    /// 释放并按新的几何尺寸与参数重建, 失败时保留原状态
    pub fn reset(&mut self, width: u32, height: u32, option: ADCensusOption) -> Result<()> {
        *self = Self::new(width, height, Some(option))?;
        Ok(())
    }

    /// 获取立体匹配视差范围
    pub fn get_disparity_range(&self) -> i32 {
        self.option.max_disparity() - self.option.min_disparity()
    }

    /// 左视差图视图
    pub fn disparity_left(&self) -> ArrayView2<'_, f32> {
        self.disparity_left.view()
    }

    /// 右视差图视图
    pub fn disparity_right(&self) -> ArrayView2<'_, f32> {
        self.disparity_right.view()
    }

    /// 立体匹配
    ///
    /// left_bgr/right_bgr 为 H x W x 3 的 BGR 交错字节缓冲区,
    /// out_disp 为 H x W 的输出缓冲区, 成功时填入左视差图,
    /// 无效像素为 INVALID_FLOAT。
    pub fn matching(
        &mut self,
        left_bgr: &[u8],
        right_bgr: &[u8],
        out_disp: &mut [f32],
    ) -> Result<()> {
        let (h, w) = (self.height as usize, self.width as usize);
        if left_bgr.len() != h * w * 3 || right_bgr.len() != h * w * 3 || out_disp.len() != h * w {
            return Err(Error::new(1003, error::ERROR_1003));
        }
        self.image_left
            .assign(&ArrayView3::from_shape((h, w, 3), left_bgr).unwrap());
        self.image_right
            .assign(&ArrayView3::from_shape((h, w, 3), right_bgr).unwrap());

        let mut sw = stopwatch::Stopwatch::start_new();
        // 1. Census变换 9x7
        self.census_transform();
        debug!(
            "[match] census transform end. elapse time: {}ms",
            sw.elapsed_ms()
        );

        // 2. 代价计算
        sw.restart();
        self.compute_cost();
        debug!(
            "[match] compute cost end. value: {} - {}. elapse time: {}ms",
            self.cost_init.min().unwrap(),
            self.cost_init.max().unwrap(),
            sw.elapsed_ms()
        );

        // 3. 代价聚合
        sw.restart();
        self.build_cross_arms();
        self.compute_sup_count();
        self.aggregate_cost(4);
        debug!(
            "[match] aggregate cost end. value: {} - {}. elapse time: {}ms",
            self.cost_aggr.min().unwrap(),
            self.cost_aggr.max().unwrap(),
            sw.elapsed_ms()
        );

        // 4. 扫描线优化
        sw.restart();
        self.scanline_optimize();
        debug!(
            "[match] scanline optimize end. elapse time: {}ms",
            sw.elapsed_ms()
        );

        // 5. 计算左右视图视差
        sw.restart();
        self.compute_disparity();
        self.compute_disparity_right();
        debug!(
            "[match] compute left/right disparity end. elapse time: {}ms",
            sw.elapsed_ms()
        );

        // 6. 多步骤视差优化
        sw.restart();
        self.multistep_refine();
        debug!(
            "[match] multistep refine end. elapse time: {}ms",
            sw.elapsed_ms()
        );

        out_disp.copy_from_slice(self.disparity_left.as_slice().unwrap());
        Ok(())
    }

    /// Census变换
    ///
    /// 先将左右图转为亮度, 再逐像素计算census序列。
    fn census_transform(&mut self) {
        let (h, w) = (self.height as usize, self.width as usize);
        let Self {
            image_left,
            image_right,
            census_left,
            census_right,
            ..
        } = self;
        let (left, right) = (image_left.view(), image_right.view());
        let mut gray_left = Array2::<u8>::zeros((h, w));
        let mut gray_right = Array2::<u8>::zeros((h, w));
        Zip::indexed(&mut gray_left)
            .and(&mut gray_right)
            .par_for_each(|(y, x), gl, gr| {
                *gl = luma(bgr(&left, y, x));
                *gr = luma(bgr(&right, y, x));
            });
        let (gray_left, gray_right) = (gray_left.view(), gray_right.view());
        Zip::indexed(census_left)
            .and(census_right)
            .par_for_each(|(y, x), cl, cr| {
                *cl = census_signature(&gray_left, y, x);
                *cr = census_signature(&gray_right, y, x);
            });
    }

    /// 计算初始代价
    ///
    /// 对每个 (像素, 视差), AD代价与Census代价分别经过 1 - exp(-c/λ)
    /// 归一后相加; 右图同名像素越界时代价为 COST_MAX。
    fn compute_cost(&mut self) {
        let min_disparity = *self.option.min_disparity();
        let lambda_ad = *self.option.lambda_ad() as f32;
        let lambda_census = *self.option.lambda_census() as f32;
        let width = self.width as i32;
        let Self {
            cost_init,
            image_left,
            image_right,
            census_left,
            census_right,
            ..
        } = self;
        let (left, right) = (image_left.view(), image_right.view());
        let (census_left, census_right) = (census_left.view(), census_right.view());
        Zip::indexed(cost_init).par_for_each(|(y, x, k), cost| {
            let xr = x as i32 - (min_disparity + k as i32);
            if xr < 0 || xr >= width {
                *cost = COST_MAX;
                return;
            }
            let xr = xr as usize;
            let pl = bgr(&left, y, x);
            let pr = bgr(&right, y, xr);
            let cost_ad = ((pl[0] as f32 - pr[0] as f32).abs()
                + (pl[1] as f32 - pr[1] as f32).abs()
                + (pl[2] as f32 - pr[2] as f32).abs())
                / 3f32;
            let cost_census = hamming_distance(census_left[(y, x)], census_right[(y, xr)]) as f32;
            *cost = (1f32 - (-cost_ad / lambda_ad).exp())
                + (1f32 - (-cost_census / lambda_census).exp());
        });
    }

    /// 构建左图十字交叉臂
    fn build_cross_arms(&mut self) {
        let cross_l1 = *self.option.cross_l1();
        let cross_l2 = *self.option.cross_l2();
        let cross_t1 = *self.option.cross_t1();
        let cross_t2 = *self.option.cross_t2();
        let max_length = cross_l1.min(MAX_ARM_LENGTH as i32);
        trace!(
            "    [build_cross_arms] L1:{}, L2:{}, t1:{}, t2:{}",
            cross_l1,
            cross_l2,
            cross_t1,
            cross_t2
        );
        let Self {
            cross_arms,
            image_left,
            ..
        } = self;
        let image = image_left.view();
        Zip::indexed(cross_arms).par_for_each(|(y, x), arm| {
            arm.set_left(walk_arm(
                &image, y, x, -1, 0, max_length, cross_l2, cross_t1, cross_t2,
            ));
            arm.set_right(walk_arm(
                &image, y, x, 1, 0, max_length, cross_l2, cross_t1, cross_t2,
            ));
            arm.set_top(walk_arm(
                &image, y, x, 0, -1, max_length, cross_l2, cross_t1, cross_t2,
            ));
            arm.set_bottom(walk_arm(
                &image, y, x, 0, 1, max_length, cross_l2, cross_t1, cross_t2,
            ));
        });
    }

    /// 统计两种聚合方向的支持区像素数量
    ///
    /// 与代价聚合同样的两次遍历结构, 只是累加的是像素个数。
    fn compute_sup_count(&mut self) {
        let Self {
            cross_arms,
            sup_count_hf,
            sup_count_vf,
            ..
        } = self;
        let arms = cross_arms.view();
        let mut tmp = Array2::<u32>::zeros(arms.dim());
        // 先横向再纵向
        Zip::from(&mut tmp).and(&arms).par_for_each(|t, arm| {
            *t = arm.horizontal_pixel_count();
        });
        let tmp_view = tmp.view();
        Zip::indexed(sup_count_hf).par_for_each(|(y, x), count| {
            let (top, bottom) = arms[(y, x)].vertical_range(y);
            *count = tmp_view.slice(s![top..=bottom, x]).sum();
        });
        // 先纵向再横向
        Zip::from(&mut tmp).and(&arms).par_for_each(|t, arm| {
            *t = arm.vertical_pixel_count();
        });
        let tmp_view = tmp.view();
        Zip::indexed(sup_count_vf).par_for_each(|(y, x), count| {
            let (left, right) = arms[(y, x)].horizontal_range(x);
            *count = tmp_view.slice(s![y, left..=right]).sum();
        });
    }

    /// 代价聚合
    ///
    /// 以初始代价为起点迭代 num_iters 次, 每次迭代遍历所有视差层,
    /// 且交替使用先横向/先纵向两种聚合方向以均衡两次遍历近似的不对称性。
    fn aggregate_cost(&mut self, num_iters: u8) {
        self.cost_aggr.assign(&self.cost_init);
        let disp_range = self.get_disparity_range() as usize;
        let mut horizontal_first = true;
        for _ in 0..num_iters {
            for k in 0..disp_range {
                self.aggregate_in_arms(k, horizontal_first);
            }
            horizontal_first = !horizontal_first;
        }
    }

    /// 聚合单个视差层
    ///
    /// 第一次遍历沿第一方向臂累加(含中心像素), 第二次遍历沿另一方向臂
    /// 累加第一次的结果, 再除以该聚合方向的支持区像素数。
    fn aggregate_in_arms(&mut self, k: usize, horizontal_first: bool) {
        let Self {
            cost_aggr,
            cost_tmp1,
            cost_tmp2,
            cross_arms,
            sup_count_hf,
            sup_count_vf,
            ..
        } = self;
        let mut slice = cost_aggr.index_axis_mut(Axis(2), k);
        cost_tmp1.assign(&slice);
        let arms = cross_arms.view();
        {
            let src = cost_tmp1.view();
            Zip::indexed(&mut *cost_tmp2).par_for_each(|(y, x), total| {
                let arm = &arms[(y, x)];
                *total = if horizontal_first {
                    let (left, right) = arm.horizontal_range(x);
                    src.slice(s![y, left..=right]).sum()
                } else {
                    let (top, bottom) = arm.vertical_range(y);
                    src.slice(s![top..=bottom, x]).sum()
                };
            });
        }
        let src = cost_tmp2.view();
        let sup = if horizontal_first {
            sup_count_hf.view()
        } else {
            sup_count_vf.view()
        };
        Zip::indexed(&mut slice).par_for_each(|(y, x), cost| {
            let arm = &arms[(y, x)];
            let total = if horizontal_first {
                let (top, bottom) = arm.vertical_range(y);
                src.slice(s![top..=bottom, x]).sum()
            } else {
                let (left, right) = arm.horizontal_range(x);
                src.slice(s![y, left..=right]).sum()
            };
            *cost = total / sup[(y, x)] as f32;
        });
    }

    /// 扫描线优化
    ///
    /// 路径顺序: 左->右, 右->左, 上->下, 下->上。
    /// 两个代价卷作为乒乓缓冲交替充当输入与输出, 最终结果落在聚合代价卷:
    ///   cost_aggr -> cost_init -> cost_aggr -> cost_init -> cost_aggr
    fn scanline_optimize(&mut self) {
        let option = self.option;
        let Self {
            cost_init,
            cost_aggr,
            image_left,
            image_right,
            ..
        } = self;
        let (left, right) = (image_left.view(), image_right.view());
        scanline_optimize_horizontal(
            &left,
            &right,
            &cost_aggr.view(),
            &mut cost_init.view_mut(),
            &option,
            true,
        );
        scanline_optimize_horizontal(
            &left,
            &right,
            &cost_init.view(),
            &mut cost_aggr.view_mut(),
            &option,
            false,
        );
        scanline_optimize_vertical(
            &left,
            &right,
            &cost_aggr.view(),
            &mut cost_init.view_mut(),
            &option,
            true,
        );
        scanline_optimize_vertical(
            &left,
            &right,
            &cost_init.view(),
            &mut cost_aggr.view_mut(),
            &option,
            false,
        );
    }

    /// 计算左视差图
    ///
    /// WTA取最小代价视差; 最优视差在视差范围端点时置为无效,
    /// 否则用相邻三个代价值做一元二次曲线拟合求子像素位置。
    fn compute_disparity(&mut self) {
        let min_disparity = *self.option.min_disparity();
        let disp_range = self.get_disparity_range() as usize;
        let Self {
            disparity_left,
            cost_aggr,
            ..
        } = self;
        let cost = cost_aggr.view();
        Zip::indexed(disparity_left).par_for_each(|(y, x), disp| {
            let lane = cost.slice(s![y, x, ..]);
            let best = match lane.argmin() {
                Ok(v) => v,
                Err(_) => {
                    *disp = INVALID_FLOAT;
                    return;
                }
            };
            if best == 0 || best == disp_range - 1 {
                *disp = INVALID_FLOAT;
                return;
            }
            let min_cost = lane[best];
            let cost_1 = lane[best - 1];
            let cost_2 = lane[best + 1];
            let denom = cost_1 + cost_2 - 2f32 * min_cost;
            let best_disparity = (min_disparity + best as i32) as f32;
            *disp = if denom != 0f32 {
                best_disparity + (cost_1 - cost_2) / (denom * 2f32)
            } else {
                best_disparity
            };
        });
    }

    /// 计算右视差图
    ///
    /// 通过左影像的代价获取右影像的代价: 右cost(xr,y,d) = 左cost(xr+d,y,d),
    /// 不做第二次聚合。端点视差直接取整数最优视差。
    fn compute_disparity_right(&mut self) {
        let min_disparity = *self.option.min_disparity();
        let max_disparity = *self.option.max_disparity();
        let disp_range = self.get_disparity_range() as usize;
        let width = self.width as i32;
        let Self {
            disparity_right,
            cost_aggr,
            ..
        } = self;
        let cost = cost_aggr.view();
        Zip::indexed(disparity_right.axis_iter_mut(Axis(0))).par_for_each(|y, mut disp_row| {
            let mut cost_local = vec![COST_MAX; disp_range];
            for x in 0..width as usize {
                let mut min_cost = COST_MAX;
                // 候选视差全部越界时落在端点分支, 取整数视差
                let mut best_disparity = min_disparity;
                for (k, slot) in cost_local.iter_mut().enumerate() {
                    let d = min_disparity + k as i32;
                    let col_left = x as i32 + d;
                    if col_left >= 0 && col_left < width {
                        let c = cost[(y, col_left as usize, k)];
                        *slot = c;
                        if min_cost > c {
                            min_cost = c;
                            best_disparity = d;
                        }
                    } else {
                        *slot = COST_MAX;
                    }
                }
                if best_disparity == min_disparity || best_disparity == max_disparity - 1 {
                    disp_row[x] = best_disparity as f32;
                    continue;
                }
                let idx = (best_disparity - min_disparity) as usize;
                let cost_1 = cost_local[idx - 1];
                let cost_2 = cost_local[idx + 1];
                let denom = cost_1 + cost_2 - 2f32 * min_cost;
                disp_row[x] = if denom != 0f32 {
                    best_disparity as f32 + (cost_1 - cost_2) / (denom * 2f32)
                } else {
                    best_disparity as f32
                };
            }
        });
    }

    /// 多步骤优化器
    fn multistep_refine(&mut self) {
        let mut mismatches: Vec<Point> = Vec::new();
        let mut occlusions: Vec<Point> = Vec::new();
        // 1. 离群点检测
        if *self.option.do_lr_check() {
            self.lr_check(&mut mismatches, &mut occlusions);
            trace!(
                "    [multistep_refine] lr-check end. mismatches({}) occlusions({}).",
                mismatches.len(),
                occlusions.len()
            );
        }
        if *self.option.do_filling() {
            // 2. 迭代局部投票
            self.iterative_region_voting(&mut mismatches, &mut occlusions);
            trace!(
                "    [multistep_refine] iterative region voting end. mismatches({}) occlusions({}).",
                mismatches.len(),
                occlusions.len()
            );
            // 3. 内插填充
            self.proper_interpolation(&mismatches, &occlusions);
            trace!("    [multistep_refine] proper interpolation end.");
        }
        // 4. 深度非连续区视差调整
        if *self.option.do_discontinuity_adjustment() {
            self.depth_discontinuity_adjustment();
            trace!("    [multistep_refine] depth discontinuity adjustment end.");
        }
        // 5. 中值滤波
        let filtered = median_filter_3x3(&self.disparity_left.view());
        self.disparity_left.assign(&filtered);
    }

    /// 左右一致性检查
    ///
    /// 一致性超阈值的像素区分为遮挡区与误匹配区后置为无效:
    /// 通过右影像视差算出左影像匹配像素的视差 disp_l,
    /// disp_l 更大的判为遮挡, 否则判为误匹配。
    /// 进入本步骤前已无效的像素直接归入误匹配区。
    fn lr_check(&mut self, mismatches: &mut Vec<Point>, occlusions: &mut Vec<Point>) {
        let threshold = *self.option.lrcheck_thres();
        let width = self.width as i32;
        mismatches.clear();
        occlusions.clear();
        let Self {
            disparity_left,
            disparity_right,
            ..
        } = self;
        let (height, w) = disparity_left.dim();
        for y in 0..height {
            for x in 0..w {
                let disp = disparity_left[(y, x)];
                if disp.is_nan() {
                    mismatches.push(Point::new(x, y));
                    continue;
                }
                // 根据视差值找到右影像上的同名像素
                let col_right = (x as f32 - disp).round() as i32;
                if col_right >= 0 && col_right < width {
                    let disp_r = disparity_right[(y, col_right as usize)];
                    if (disp - disp_r).abs() > threshold {
                        let col_rl = (col_right as f32 + disp_r).round() as i32;
                        if col_rl > 0 && col_rl < width {
                            let disp_l = disparity_left[(y, col_rl as usize)];
                            // 无效值在此比较中不计为更大, 归入误匹配
                            if disp_l > disp {
                                occlusions.push(Point::new(x, y));
                            } else {
                                mismatches.push(Point::new(x, y));
                            }
                        } else {
                            mismatches.push(Point::new(x, y));
                        }
                        disparity_left[(y, x)] = INVALID_FLOAT;
                    }
                } else {
                    // 通过视差值在右影像找不到同名像素(超出影像范围)
                    disparity_left[(y, x)] = INVALID_FLOAT;
                    mismatches.push(Point::new(x, y));
                }
            }
        }
    }

    /// 迭代局部投票
    ///
    /// 迭代5次, 每次先处理误匹配区再处理遮挡区。对仍无效的像素,
    /// 统计其十字交叉臂支持区内有效视差的直方图, 有效数超过 ts 且
    /// 最大桶占比超过 th 时以最大桶视差填充, 并从待处理集合中移除。
    fn iterative_region_voting(
        &mut self,
        mismatches: &mut Vec<Point>,
        occlusions: &mut Vec<Point>,
    ) {
        let min_disparity = *self.option.min_disparity();
        let disp_range = self.get_disparity_range();
        if disp_range <= 0 {
            return;
        }
        let irv_ts = *self.option.irv_ts();
        let irv_th = *self.option.irv_th();
        let Self {
            disparity_left,
            cross_arms,
            ..
        } = self;
        let arms = cross_arms.view();
        for _ in 0..5 {
            for k in 0..2 {
                let trg_pixels: &mut Vec<Point> = if k == 0 {
                    &mut *mismatches
                } else {
                    &mut *occlusions
                };
                for pix in trg_pixels.iter() {
                    let (x, y) = (*pix.x(), *pix.y());
                    if !disparity_left[(y, x)].is_nan() {
                        continue;
                    }
                    // 支持区视差直方图
                    let mut hist = ndhistogram!(
                        UniformNoFlow::new(disp_range as usize, 0f32, disp_range as f32); u32
                    );
                    let arm = &arms[(y, x)];
                    let (top, bottom) = arm.vertical_range(y);
                    for yt in top..=bottom {
                        let arm2 = &arms[(yt, x)];
                        let (left, right) = arm2.horizontal_range(x);
                        for xs in left..=right {
                            let d = disparity_left[(yt, xs)];
                            if d.is_nan() {
                                continue;
                            }
                            let di = d.round() as i32 - min_disparity;
                            if di >= 0 && di < disp_range {
                                hist.fill(&(di as f32 + 0.5f32));
                            }
                        }
                    }
                    let mut best_disp = 0i32;
                    let mut max_ht = 0u32;
                    let mut count = 0u32;
                    for (d, h) in hist.values().enumerate() {
                        if max_ht < *h {
                            max_ht = *h;
                            best_disp = d as i32;
                        }
                        count += *h;
                    }
                    if max_ht > 0 && count as i32 > irv_ts && max_ht as f32 / count as f32 > irv_th
                    {
                        disparity_left[(y, x)] = (best_disp + min_disparity) as f32;
                    }
                }
                // 删除已填充的像素
                trg_pixels.retain(|p| disparity_left[(*p.y(), *p.x())].is_nan());
            }
        }
    }

    /// 内插填充
    ///
    /// 对每个待填充像素沿16个方向寻找首个有效视差。误匹配区取颜色最接近
    /// 像素的视差, 遮挡区取最小视差。每个集合统一计算后再批量写回,
    /// 避免本集合内先填充的值影响后续像素的射线采样。
    /// 16个方向都没有有效视差时保持无效。
    fn proper_interpolation(&mut self, mismatches: &[Point], occlusions: &[Point]) {
        let pi = std::f32::consts::PI;
        let width = self.width as i32;
        let height = self.height as i32;
        // 最大搜索行程, 没有必要搜索太远的像素
        let max_search_length =
            (*self.option.max_disparity()).abs().max((*self.option.min_disparity()).abs());
        let Self {
            disparity_left,
            image_left,
            ..
        } = self;
        let image = image_left.view();
        let mut disp_collects: Vec<(Point, f32)> = Vec::new();
        for k in 0..2 {
            let trg_pixels = if k == 0 { mismatches } else { occlusions };
            if trg_pixels.is_empty() {
                continue;
            }
            let mut fill_disps = vec![INVALID_FLOAT; trg_pixels.len()];
            for (n, pix) in trg_pixels.iter().enumerate() {
                let (x, y) = (*pix.x() as i32, *pix.y() as i32);
                disp_collects.clear();
                let mut ang = 0f32;
                for _ in 0..16 {
                    let sina = ang.sin();
                    let cosa = ang.cos();
                    for m in 1..max_search_length {
                        let yy = (y as f32 + m as f32 * sina).round() as i32;
                        let xx = (x as f32 + m as f32 * cosa).round() as i32;
                        if yy < 0 || yy >= height || xx < 0 || xx >= width {
                            break;
                        }
                        let d = disparity_left[(yy as usize, xx as usize)];
                        if !d.is_nan() {
                            disp_collects.push((Point::new(xx as usize, yy as usize), d));
                            break;
                        }
                    }
                    ang += pi / 16f32;
                }
                if disp_collects.is_empty() {
                    continue;
                }
                if k == 0 {
                    // 误匹配区: 选择颜色最相近的像素视差值
                    let color = bgr(&image, y as usize, x as usize);
                    let mut min_dist = i32::MAX;
                    for (p, d) in &disp_collects {
                        let color2 = bgr(&image, *p.y(), *p.x());
                        let dist = pixel_distance_l1(&color, &color2);
                        if min_dist > dist {
                            min_dist = dist;
                            fill_disps[n] = *d;
                        }
                    }
                } else {
                    // 遮挡区: 选择最小视差值
                    let mut min_disp = COST_MAX;
                    for (_, d) in &disp_collects {
                        min_disp = min_disp.min(*d);
                    }
                    fill_disps[n] = min_disp;
                }
            }
            for (n, pix) in trg_pixels.iter().enumerate() {
                disparity_left[(*pix.y(), *pix.x())] = fill_disps[n];
            }
        }
    }

    /// 深度非连续区视差调整
    ///
    /// 在视差图上做边缘检测, 对边缘像素比较其视差与左右邻像素视差
    /// 在各自代价列上的代价值, 取代价更小者的视差。原地更新,
    /// 行内靠后的像素能看到前面像素的调整结果。
    fn depth_discontinuity_adjustment(&mut self) {
        let min_disparity = *self.option.min_disparity();
        let disp_range = self.get_disparity_range();
        let Self {
            disparity_left,
            cost_aggr,
            ..
        } = self;
        let edges = edge_detect_with_sobel(&disparity_left.view(), 5.0f32);
        let cost = cost_aggr.view();
        let (height, width) = disparity_left.dim();
        if width < 2 {
            return;
        }
        for y in 0..height {
            for x in 1..width - 1 {
                if !edges[(y, x)] {
                    continue;
                }
                let d = disparity_left[(y, x)];
                if d.is_nan() {
                    continue;
                }
                let di = d.round() as i32 - min_disparity;
                if di < 0 || di >= disp_range {
                    continue;
                }
                let mut c0 = cost[(y, x, di as usize)];
                for k in 0..2 {
                    let x2 = if k == 0 { x - 1 } else { x + 1 };
                    let d2 = disparity_left[(y, x2)];
                    if d2.is_nan() {
                        continue;
                    }
                    let d2i = d2.round() as i32 - min_disparity;
                    if d2i < 0 || d2i >= disp_range {
                        continue;
                    }
                    let c = cost[(y, x2, d2i as usize)];
                    if c < c0 {
                        disparity_left[(y, x)] = d2;
                        c0 = c;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// xorshift32 伪随机噪声影像, 测试可重复
    fn noise_bgr(width: u32, height: u32, seed: u32) -> Vec<u8> {
        let n = (width * height * 3) as usize;
        let mut state = seed;
        let mut buf = Vec::with_capacity(n);
        for _ in 0..n {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            buf.push((state >> 24) as u8);
        }
        buf
    }

    /// 右图 = 左图左移 shift 列, 右边界补零
    fn shifted_right(left: &[u8], width: u32, height: u32, shift: usize) -> Vec<u8> {
        let (w, h) = (width as usize, height as usize);
        let mut right = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                if x + shift < w {
                    for c in 0..3 {
                        right[(y * w + x) * 3 + c] = left[(y * w + x + shift) * 3 + c];
                    }
                }
            }
        }
        right
    }

    #[test]
    fn test_constant_pair_all_invalid() {
        let (w, h) = (32u32, 32u32);
        let buf = vec![128u8; (w * h * 3) as usize];
        let option = ADCensusOption::new(0, 8)
            .set_do_lr_check(false)
            .set_do_filling(false)
            .set_do_discontinuity_adjustment(false)
            .build();
        let mut engine = ADCensus::new(w, h, Some(option)).unwrap();
        let mut out = vec![0f32; (w * h) as usize];
        engine.matching(&buf, &buf, &mut out).unwrap();
        // 代价对所有视差相同, WTA取最小下标0, 端点规则使全部像素无效
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_integer_shift_recovered() {
        let (w, h) = (64u32, 32u32);
        let left = noise_bgr(w, h, 0x1234_5678);
        let right = shifted_right(&left, w, h, 3);
        let mut engine = ADCensus::new(w, h, Some(ADCensusOption::new(0, 8).build())).unwrap();
        let mut out = vec![0f32; (w * h) as usize];
        engine.matching(&left, &right, &mut out).unwrap();
        // 有限视差值不超出 [dmin - 0.5, dmax - 0.5]
        for v in &out {
            if v.is_finite() {
                assert!(*v >= -0.5 && *v <= 7.5, "disparity out of range: {}", v);
            }
        }
        let mut total = 0u32;
        let mut good = 0u32;
        for y in 4..28usize {
            for x in 16..48usize {
                total += 1;
                let d = out[y * w as usize + x];
                if d.is_finite() && (d - 3.0).abs() <= 0.5 {
                    good += 1;
                }
            }
        }
        assert!(
            good as f32 / total as f32 >= 0.95,
            "recovered {}/{}",
            good,
            total
        );
    }

    #[test]
    fn test_degenerate_disparity_range_rejected() {
        let err = ADCensus::new(10, 10, Some(ADCensusOption::new(5, 5).build())).unwrap_err();
        assert_eq!(err.code, 1002);
        let err = ADCensus::new(0, 10, None).unwrap_err();
        assert_eq!(err.code, 1001);
    }

    #[test]
    fn test_wrong_buffer_rejected_and_output_untouched() {
        let (w, h) = (16u32, 16u32);
        let mut engine = ADCensus::new(w, h, Some(ADCensusOption::new(0, 8).build())).unwrap();
        let good = vec![0u8; (w * h * 3) as usize];
        let short = vec![0u8; (w * h * 3 - 1) as usize];
        let mut out = vec![-7f32; (w * h) as usize];
        let err = engine.matching(&short, &good, &mut out).unwrap_err();
        assert_eq!(err.code, 1003);
        let err = engine.matching(&good, &short, &mut out).unwrap_err();
        assert_eq!(err.code, 1003);
        let mut out_short = vec![-7f32; (w * h - 1) as usize];
        let err = engine.matching(&good, &good, &mut out_short).unwrap_err();
        assert_eq!(err.code, 1003);
        assert!(out.iter().all(|v| *v == -7f32));
    }

    #[test]
    fn test_reset_rebuilds_geometry() {
        let mut engine = ADCensus::new(16, 8, Some(ADCensusOption::new(0, 4).build())).unwrap();
        engine.reset(8, 8, ADCensusOption::new(0, 4)).unwrap();
        assert_eq!(engine.width(), 8);
        assert_eq!(engine.height(), 8);
        // 旧尺寸的缓冲区被拒绝
        let left = vec![0u8; 16 * 8 * 3];
        let right = vec![0u8; 16 * 8 * 3];
        let mut out = vec![0f32; 16 * 8];
        assert_eq!(engine.matching(&left, &right, &mut out).unwrap_err().code, 1003);
        // 非法参数的 reset 保留原状态
        assert!(engine.reset(8, 8, ADCensusOption::new(3, 3)).is_err());
        assert_eq!(engine.width(), 8);
    }

    #[test]
    fn test_census_constant_image_zero_signature() {
        let mut engine = ADCensus::new(16, 16, Some(ADCensusOption::new(0, 4).build())).unwrap();
        engine.image_left.fill(128);
        engine.image_right.fill(128);
        engine.census_transform();
        assert!(engine.census_left.iter().all(|&c| c == 0));
        assert!(engine.census_right.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_census_bright_center_sets_all_bits() {
        let mut engine = ADCensus::new(16, 16, Some(ADCensusOption::new(0, 4).build())).unwrap();
        engine.image_left.fill(10);
        engine.image_right.fill(10);
        for c in 0..3 {
            engine.image_left[(8, 8, c)] = 200;
        }
        engine.census_transform();
        // 亮点自身: 62个邻域像素全部更暗
        assert_eq!(engine.census_left[(8, 8)].count_ones(), 62);
        // 其余像素: 邻域不低于中心, 签名为0
        assert_eq!(engine.census_left[(8, 7)], 0);
        assert!(engine.census_right.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_cross_arm_rules() {
        let mut engine = ADCensus::new(12, 3, Some(ADCensusOption::new(0, 8).build())).unwrap();
        engine
            .option
            .set_cross_l1(10)
            .set_cross_l2(3)
            .set_cross_t1(20)
            .set_cross_t2(6);
        // 行0: 色差在 t2 与 t1 之间, 臂长被 L2 限制
        // 行1: 与前一像素色差达到 t1, 提前终止
        // 行2: 与中心像素色差达到 t1, 臂长为0
        for x in 0..12usize {
            let v0 = if x < 3 { 100u8 } else { 108u8 };
            let v1 = match x {
                0 => 100u8,
                1 => 81u8,
                _ => 101u8,
            };
            let v2 = if x == 0 { 100u8 } else { 125u8 };
            for c in 0..3usize {
                engine.image_left[(0, x, c)] = v0;
                engine.image_left[(1, x, c)] = v1;
                engine.image_left[(2, x, c)] = v2;
            }
        }
        engine.build_cross_arms();
        assert_eq!(*engine.cross_arms[(0, 0)].right(), 3);
        assert_eq!(*engine.cross_arms[(1, 0)].right(), 1);
        assert_eq!(*engine.cross_arms[(2, 0)].right(), 0);
        // 影像边界
        assert_eq!(*engine.cross_arms[(0, 0)].left(), 0);
        assert_eq!(*engine.cross_arms[(0, 0)].top(), 0);
    }

    #[test]
    fn test_cross_arm_bounds() {
        let (w, h) = (40u32, 30u32);
        let noise = noise_bgr(w, h, 0xDEAD_BEEF);
        let mut engine = ADCensus::new(w, h, Some(ADCensusOption::new(0, 8).build())).unwrap();
        engine
            .image_left
            .assign(&ArrayView3::from_shape((30, 40, 3), &noise[..]).unwrap());
        engine.build_cross_arms();
        let cross_l1 = *engine.option.cross_l1();
        for ((y, x), arm) in engine.cross_arms.indexed_iter() {
            let (left, right) = (*arm.left() as i32, *arm.right() as i32);
            let (top, bottom) = (*arm.top() as i32, *arm.bottom() as i32);
            assert!(left + right <= 2 * cross_l1);
            assert!(top + bottom <= 2 * cross_l1);
            assert!(x as i32 - left >= 0 && x as i32 + right < w as i32);
            assert!(y as i32 - top >= 0 && y as i32 + bottom < h as i32);
        }
    }

    #[test]
    fn test_scanline_constant_volume_fixed_point() {
        let (h, w, d) = (4usize, 8usize, 4usize);
        let image = Array3::<u8>::from_elem((h, w, 3), 90);
        let src = Array3::<f32>::from_elem((h, w, d), 0.75);
        let mut dst = Array3::<f32>::zeros((h, w, d));
        let option = ADCensusOption::new(0, 4);
        scanline_optimize_horizontal(
            &image.view(),
            &image.view(),
            &src.view(),
            &mut dst.view_mut(),
            &option,
            true,
        );
        // 常数代价卷是该递推的不动点
        assert!(dst.iter().all(|v| (*v - 0.75).abs() < 1e-6));
        let mut dst2 = Array3::<f32>::zeros((h, w, d));
        scanline_optimize_vertical(
            &image.view(),
            &image.view(),
            &dst.view(),
            &mut dst2.view_mut(),
            &option,
            false,
        );
        assert!(dst2.iter().all(|v| (*v - 0.75).abs() < 1e-6));
    }

    /// 构造一致的视差图对: 除测试列外双向视差均为0
    fn lr_check_fixture() -> ADCensus {
        let mut engine = ADCensus::new(10, 3, Some(ADCensusOption::new(0, 8).build())).unwrap();
        engine.disparity_left.fill(0f32);
        engine.disparity_right.fill(0f32);
        for y in 0..3usize {
            // 三个相邻列映射到同一右图列2, 其后方存在更大视差
            engine.disparity_left[(y, 5)] = 3.0;
            engine.disparity_left[(y, 6)] = 4.0;
            engine.disparity_left[(y, 7)] = 5.0;
            engine.disparity_left[(y, 9)] = 7.0;
            engine.disparity_left[(y, 2)] = INVALID_FLOAT;
            engine.disparity_right[(y, 2)] = 7.0;
        }
        engine
    }

    #[test]
    fn test_lr_check_classification() {
        let mut engine = lr_check_fixture();
        let mut mismatches = Vec::new();
        let mut occlusions = Vec::new();
        engine.lr_check(&mut mismatches, &mut occlusions);
        // 列5/6/7为遮挡, 预先无效的列2为误匹配
        assert_eq!(occlusions.len(), 9);
        assert_eq!(mismatches.len(), 3);
        for y in 0..3usize {
            for x in 5..=7usize {
                assert!(occlusions.contains(&Point::new(x, y)));
                assert!(!mismatches.contains(&Point::new(x, y)));
                assert!(engine.disparity_left[(y, x)].is_nan());
            }
            assert!(mismatches.contains(&Point::new(2, y)));
            // 一致的像素不受影响
            assert_eq!(engine.disparity_left[(y, 9)], 7.0);
            assert_eq!(engine.disparity_left[(y, 0)], 0.0);
        }
        // 遮挡区与误匹配区不相交
        for p in &occlusions {
            assert!(!mismatches.contains(p));
        }
    }

    #[test]
    fn test_lr_check_idempotent() {
        let mut engine = lr_check_fixture();
        let saved = engine.disparity_left.clone();
        let mut mismatches1 = Vec::new();
        let mut occlusions1 = Vec::new();
        engine.lr_check(&mut mismatches1, &mut occlusions1);
        engine.disparity_left.assign(&saved);
        let mut mismatches2 = Vec::new();
        let mut occlusions2 = Vec::new();
        engine.lr_check(&mut mismatches2, &mut occlusions2);
        assert_eq!(mismatches1, mismatches2);
        assert_eq!(occlusions1, occlusions2);
    }

    /// 支持区内恰好20个有效视差, 其中9个为3
    fn voting_fixture(irv_ts: i32) -> (ADCensus, Vec<Point>) {
        let mut engine = ADCensus::new(32, 32, Some(ADCensusOption::new(0, 8).build())).unwrap();
        engine.option.set_irv_ts(irv_ts);
        engine.disparity_left.fill(INVALID_FLOAT);
        for &row in &[8usize, 9, 11, 12] {
            engine.cross_arms[(row, 10)].set_left(2).set_right(1);
        }
        engine.cross_arms[(10, 10)]
            .set_left(2)
            .set_right(2)
            .set_top(2)
            .set_bottom(2);
        for &row in &[8usize, 9] {
            for x in 8..=11usize {
                engine.disparity_left[(row, x)] = 3.0;
            }
        }
        engine.disparity_left[(10, 8)] = 3.0;
        engine.disparity_left[(10, 9)] = 1.0;
        engine.disparity_left[(10, 11)] = 1.0;
        engine.disparity_left[(10, 12)] = 2.0;
        engine.disparity_left[(11, 8)] = 1.0;
        engine.disparity_left[(11, 9)] = 1.0;
        engine.disparity_left[(11, 10)] = 2.0;
        engine.disparity_left[(11, 11)] = 2.0;
        engine.disparity_left[(12, 8)] = 2.0;
        engine.disparity_left[(12, 9)] = 5.0;
        engine.disparity_left[(12, 10)] = 5.0;
        engine.disparity_left[(12, 11)] = 5.0;
        (engine, vec![Point::new(10, 10)])
    }

    #[test]
    fn test_region_voting_threshold_not_exceeded() {
        // 有效数20不大于 ts=20, 不触发填充
        let (mut engine, mut mismatches) = voting_fixture(20);
        let mut occlusions = Vec::new();
        engine.iterative_region_voting(&mut mismatches, &mut occlusions);
        assert!(engine.disparity_left[(10, 10)].is_nan());
        assert_eq!(mismatches.len(), 1);
    }

    #[test]
    fn test_region_voting_fires_above_threshold() {
        // ts=19 时 20 > 19, 且最大桶占比 9/20 > 0.4, 填充视差3
        let (mut engine, mut mismatches) = voting_fixture(19);
        let mut occlusions = Vec::new();
        engine.iterative_region_voting(&mut mismatches, &mut occlusions);
        assert_eq!(engine.disparity_left[(10, 10)], 3.0);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_proper_interpolation_rules() {
        let mut engine = ADCensus::new(16, 16, Some(ADCensusOption::new(0, 8).build())).unwrap();
        engine.disparity_left.fill(INVALID_FLOAT);
        engine.image_left.fill(100);
        // 目标像素(8,8)颜色与左侧样本一致, 与右侧样本差异大
        for c in 0..3usize {
            engine.image_left[(8, 10, c)] = 200;
        }
        engine.disparity_left[(8, 6)] = 5.0;
        engine.disparity_left[(8, 10)] = 2.0;
        let mismatches = vec![Point::new(8, 8)];
        engine.proper_interpolation(&mismatches, &[]);
        // 误匹配区: 取颜色最接近的样本的视差
        assert_eq!(engine.disparity_left[(8, 8)], 5.0);

        // 遮挡区: 同样的采样改取最小视差
        let mut engine = ADCensus::new(16, 16, Some(ADCensusOption::new(0, 8).build())).unwrap();
        engine.disparity_left.fill(INVALID_FLOAT);
        engine.image_left.fill(100);
        engine.disparity_left[(8, 6)] = 5.0;
        engine.disparity_left[(8, 10)] = 2.0;
        let occlusions = vec![Point::new(8, 8)];
        engine.proper_interpolation(&[], &occlusions);
        assert_eq!(engine.disparity_left[(8, 8)], 2.0);

        // 没有任何有效样本时保持无效
        let mut engine = ADCensus::new(16, 16, Some(ADCensusOption::new(0, 8).build())).unwrap();
        engine.disparity_left.fill(INVALID_FLOAT);
        let mismatches = vec![Point::new(8, 8)];
        engine.proper_interpolation(&mismatches, &[]);
        assert!(engine.disparity_left[(8, 8)].is_nan());
    }
}
