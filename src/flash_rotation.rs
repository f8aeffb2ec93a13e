//! 定位弹幕的几何换算
//!
//! 旧版 Flash 播放器以 672×438 的舞台为坐标系，并对 Y/Z 轴旋转做透视投影。
//! 这里把这些坐标与旋转换算为 ASS 画面上的位置、`\frx\fry\frz` 角度和缩放比例。

use std::f64::consts::PI;

/// 旧版播放器的舞台尺寸。
pub const PLAYER_WIDTH: f64 = 672.0;
pub const PLAYER_HEIGHT: f64 = 438.0;

/// 投影后的锚点与旋转参数。角度单位为度，缩放为百分比。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlashRotation {
    pub x: f64,
    pub y: f64,
    pub rot_x: f64,
    pub rot_y: f64,
    pub rot_z: f64,
    pub scale: f64,
}

/// 把角度归一到 (-180, 180]。
#[must_use]
pub fn wrap_angle(deg: f64) -> f64 {
    180.0 - (180.0 - deg).rem_euclid(360.0)
}

/// 保持宽高比把 `source` 尺寸缩放进 `target`，返回 `(缩放比例, x 偏移, y 偏移)`。
#[must_use]
pub fn zoom_factor(source: (f64, f64), target: (f64, f64)) -> (f64, f64, f64) {
    let (src_w, src_h) = source;
    let (dst_w, dst_h) = target;
    if src_w <= 0.0 || src_h <= 0.0 || dst_w <= 0.0 || dst_h <= 0.0 {
        return (1.0, 0.0, 0.0);
    }

    let source_aspect = src_w / src_h;
    let target_aspect = dst_w / dst_h;
    if target_aspect < source_aspect {
        // 画面更窄，上下留黑边
        let scale = dst_w / src_w;
        (scale, 0.0, (dst_h - dst_w / source_aspect) / 2.0)
    } else if target_aspect > source_aspect {
        let scale = dst_h / src_h;
        (scale, (dst_w - dst_h * source_aspect) / 2.0, 0.0)
    } else {
        (dst_w / src_w, 0.0, 0.0)
    }
}

/// 把 Flash 的 Y/Z 轴旋转和锚点 `(x, y)` 投影到 `width × height` 的画面上。
///
/// 视场按画面宽度固定为 `width * tan(2π/9) / 2`。旋转后位于镜头之后的物体会被翻转
/// 180° 并取缩放的绝对值。
#[must_use]
pub fn convert_flash_rotation(
    rot_y: i32,
    rot_z: i32,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> FlashRotation {
    let mut rot_y_deg = wrap_angle(f64::from(rot_y));
    let rot_z_deg = wrap_angle(f64::from(rot_z));
    // cos(±90°) 为 0，避开除零
    if rot_y_deg == 90.0 || rot_y_deg == -90.0 {
        rot_y_deg -= 1.0;
    }

    let ry = rot_y_deg.to_radians();
    let rz = rot_z_deg.to_radians();

    let (mut out_x, mut out_y, out_z) = if rot_y_deg == 0.0 || rot_z_deg == 0.0 {
        (0.0, -rot_y_deg, -rot_z_deg)
    } else {
        (
            (ry.sin() * rz.sin()).asin().to_degrees(),
            (-ry.sin() * rz.cos()).atan2(ry.cos()).to_degrees(),
            (-ry.cos() * rz.sin()).atan2(rz.cos()).to_degrees(),
        )
    };

    let (cos_y, cos_z, sin_y, sin_z) = (ry.cos(), rz.cos(), ry.sin(), rz.sin());
    let tr_x = (x * cos_z + y * sin_z) / cos_y + (1.0 - cos_z / cos_y) * width / 2.0
        - sin_z / cos_y * height / 2.0;
    let tr_y = y * cos_z - x * sin_z + sin_z * width / 2.0 + (1.0 - cos_z) * height / 2.0;
    let tr_z = (tr_x - width / 2.0) * sin_y;

    let fov = width * (2.0 * PI / 9.0).tan() / 2.0;
    let mut scale = if (fov + tr_z).abs() < f64::EPSILON {
        log::warn!(target: "danmaku::placed", "旋转使弹幕落在镜头平面上: trZ = {tr_z:.0}");
        1.0
    } else {
        fov / (fov + tr_z)
    };

    let proj_x = (tr_x - width / 2.0) * scale + width / 2.0;
    let proj_y = (tr_y - height / 2.0) * scale + height / 2.0;

    if scale < 0.0 {
        scale = -scale;
        out_x += 180.0;
        out_y += 180.0;
        log::warn!(target: "danmaku::placed", "旋转使弹幕落在镜头之后: trZ = {tr_z:.0} < {fov:.0}");
    }

    FlashRotation {
        x: proj_x,
        y: proj_y,
        rot_x: wrap_angle(out_x),
        rot_y: wrap_angle(out_y),
        rot_z: wrap_angle(out_z),
        scale: scale * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_wrap_angle() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert_eq!(wrap_angle(180.0), 180.0);
        assert_eq!(wrap_angle(-180.0), 180.0);
        assert_eq!(wrap_angle(270.0), -90.0);
        assert_eq!(wrap_angle(-450.0), -90.0);
        assert_eq!(wrap_angle(725.0), 5.0);
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let r = convert_flash_rotation(0, 0, 100.0, 200.0, 1280.0, 720.0);
        assert!(approx(r.x, 100.0));
        assert!(approx(r.y, 200.0));
        assert!(approx(r.scale, 100.0));
        assert!(approx(r.rot_x, 0.0));
        assert!(approx(r.rot_y, 0.0));
        assert!(approx(r.rot_z, 0.0));
    }

    #[test]
    fn test_z_rotation_about_center() {
        // 画面中心绕 Z 轴旋转后保持不动，只产生 frz
        let r = convert_flash_rotation(0, 90, 640.0, 360.0, 1280.0, 720.0);
        assert!(approx(r.x, 640.0));
        assert!(approx(r.y, 360.0));
        assert!(approx(r.scale, 100.0));
        assert!(approx(r.rot_z, -90.0));
    }

    #[test]
    fn test_y_rotation_scales_off_center_points() {
        let r = convert_flash_rotation(30, 0, 1000.0, 360.0, 1280.0, 720.0);
        assert!(approx(r.rot_y, -30.0));
        assert!(r.scale > 0.0);
        assert!(r.scale < 100.0);
        assert!(approx(r.y, 360.0));
    }

    #[test]
    fn test_right_angle_is_nudged() {
        let r = convert_flash_rotation(90, 0, 640.0, 360.0, 1280.0, 720.0);
        assert!(r.x.is_finite());
        assert!(r.y.is_finite());
        assert!(approx(r.rot_y, -89.0));
    }

    #[test]
    fn test_zoom_factor() {
        // 16:9 画面比播放器更宽，左右留边
        let (scale, off_x, off_y) = zoom_factor((PLAYER_WIDTH, PLAYER_HEIGHT), (1280.0, 720.0));
        assert!(approx(scale, 720.0 / 438.0));
        assert!(approx(off_x, (1280.0 - 720.0 * 672.0 / 438.0) / 2.0));
        assert_eq!(off_y, 0.0);

        let (scale, off_x, off_y) = zoom_factor((PLAYER_WIDTH, PLAYER_HEIGHT), (672.0, 876.0));
        assert!(approx(scale, 1.0));
        assert_eq!(off_x, 0.0);
        assert!(approx(off_y, 219.0));

        assert_eq!(zoom_factor((672.0, 438.0), (1344.0, 876.0)), (2.0, 0.0, 0.0));
        assert_eq!(zoom_factor((0.0, 438.0), (1280.0, 720.0)), (1.0, 0.0, 0.0));
    }
}
