use crate::{
    pipeline::frame_buffer::luma,
    types::{Frame, Landmark, NormalizedRect},
};

pub const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const LINE_COLOR: [u8; 4] = [56, 189, 248, 255];
const POINT_COLOR: [u8; 4] = [248, 113, 113, 255];
const RECT_COLOR: [u8; 4] = [16, 185, 129, 255];

fn thickness_for(frame: &Frame) -> i32 {
    (frame.width().min(frame.height()) as i32 / 160).max(1)
}

pub fn draw_skeleton(frame: &mut Frame, landmarks: &[Landmark]) {
    if landmarks.is_empty() {
        return;
    }
    let points: Vec<(f32, f32)> = landmarks
        .iter()
        .map(|lm| to_pixels(frame, lm.x, lm.y))
        .collect();
    let thickness = thickness_for(frame);

    for &(a, b) in CONNECTIONS {
        if let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) {
            draw_line(frame, *pa, *pb, LINE_COLOR, thickness);
        }
    }

    let radius = thickness + 1;
    for &point in &points {
        if let Some(center) = pixel_near_frame(frame, point, radius) {
            draw_circle(frame, center, radius, POINT_COLOR);
        }
    }
}

pub fn draw_rect(frame: &mut Frame, rect: &NormalizedRect) {
    let (cx, cy) = to_pixels(frame, rect.x_center, rect.y_center);
    let half_w = rect.width * frame.width() as f32 / 2.0;
    let half_h = rect.height * frame.height() as f32 / 2.0;
    let (sin, cos) = rect.rotation.sin_cos();
    let corner = |dx: f32, dy: f32| (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos);
    let corners = [
        corner(-half_w, -half_h),
        corner(half_w, -half_h),
        corner(half_w, half_h),
        corner(-half_w, half_h),
    ];

    let thickness = thickness_for(frame);
    for i in 0..corners.len() {
        let next = corners[(i + 1) % corners.len()];
        draw_line(frame, corners[i], next, RECT_COLOR, thickness);
    }
}

fn to_pixels(frame: &Frame, x: f32, y: f32) -> (f32, f32) {
    (x * frame.width() as f32, y * frame.height() as f32)
}

fn pixel_near_frame(frame: &Frame, point: (f32, f32), margin: i32) -> Option<(i32, i32)> {
    let (x, y) = point;
    let margin = margin as f32;
    let inside = |v: f32, side: u32| v.is_finite() && v >= -margin && v <= side as f32 + margin;
    (inside(x, frame.width()) && inside(y, frame.height())).then(|| (x as i32, y as i32))
}

/// Liang-Barsky clip of a segment to the pixel grid of `frame`.
fn clip_to_frame(
    frame: &Frame,
    p0: (f32, f32),
    p1: (f32, f32),
) -> Option<((i32, i32), (i32, i32))> {
    if frame.width() == 0 || frame.height() == 0 {
        return None;
    }
    let (x0, y0, x1, y1) = (p0.0 as f64, p0.1 as f64, p1.0 as f64, p1.1 as f64);
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (max_x, max_y) = ((frame.width() - 1) as f64, (frame.height() - 1) as f64);
    let (dx, dy) = (x1 - x0, y1 - y0);

    let (mut enter, mut exit) = (0.0f64, 1.0f64);
    for (p, q) in [(-dx, x0), (dx, max_x - x0), (-dy, y0), (dy, max_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            enter = enter.max(t);
        } else {
            exit = exit.min(t);
        }
        if enter > exit {
            return None;
        }
    }

    let at = |t: f64| {
        (
            (x0 + t * dx).round().clamp(0.0, max_x) as i32,
            (y0 + t * dy).round().clamp(0.0, max_y) as i32,
        )
    };
    Some((at(enter), at(exit)))
}

fn draw_line(frame: &mut Frame, p0: (f32, f32), p1: (f32, f32), color: [u8; 4], thickness: i32) {
    let Some(((mut x0, mut y0), (x1, y1))) = clip_to_frame(frame, p0, p1) else {
        return;
    };
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    put_pixel_safe(frame, x0 + ox, y0 + oy, color);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(frame: &mut Frame, center: (i32, i32), radius: i32, color: [u8; 4]) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(frame: &mut Frame, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    let (width, height) = (frame.width(), frame.height());
    if ux >= width || uy >= height {
        return;
    }
    let channels = frame.channels() as usize;
    let idx = (uy as usize * width as usize + ux as usize) * channels;
    let data = frame.data_mut();
    match channels {
        1 => data[idx] = luma(color[0], color[1], color[2]),
        n => data[idx..idx + n].copy_from_slice(&color[..n]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;

    #[test]
    fn skeleton_touches_only_visible_pixels() {
        let mut frame = Frame::blank(32, 32, PixelFormat::Rgb8).unwrap();
        let landmarks = vec![Landmark::new(0.5, 0.5, 0.0), Landmark::new(1.5, -0.5, 0.0)];
        draw_skeleton(&mut frame, &landmarks);

        let center = (16 * 32 + 16) * 3;
        assert_eq!(&frame.data()[center..center + 3], &POINT_COLOR[..3]);
    }

    #[test]
    fn far_off_frame_landmarks_are_clipped() {
        let mut frame = Frame::blank(8, 8, PixelFormat::Rgb8).unwrap();
        let landmarks = vec![
            Landmark::new(-1e12, 0.5, 0.0),
            Landmark::new(1e12, 0.5, 0.0),
            Landmark::new(f32::NAN, f32::INFINITY, 0.0),
        ];
        draw_skeleton(&mut frame, &landmarks);

        for x in 0..8 {
            let idx = (4 * 8 + x) * 3;
            assert_eq!(&frame.data()[idx..idx + 3], &LINE_COLOR[..3], "x = {x}");
        }
        assert!(frame.data()[..3 * 8 * 3].iter().all(|&v| v == 0));
    }

    #[test]
    fn rect_far_larger_than_frame_draws_nothing() {
        let mut frame = Frame::blank(8, 8, PixelFormat::Gray8).unwrap();
        for width in [1e20, f32::MAX] {
            let rect = NormalizedRect {
                x_center: 0.5,
                y_center: 0.5,
                width,
                height: 1e20,
                rotation: 0.3,
                rect_id: 0,
            };
            draw_rect(&mut frame, &rect);
        }
        assert!(frame.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn gray_frames_receive_luma() {
        let mut frame = Frame::blank(8, 8, PixelFormat::Gray8).unwrap();
        put_pixel_safe(&mut frame, 2, 3, RECT_COLOR);
        assert_eq!(frame.data()[3 * 8 + 2], luma(16, 185, 129));
    }

    #[test]
    fn rect_outline_leaves_center_untouched() {
        let mut frame = Frame::blank(40, 40, PixelFormat::Rgba8).unwrap();
        let rect = NormalizedRect {
            x_center: 0.5,
            y_center: 0.5,
            width: 0.5,
            height: 0.5,
            rotation: 0.0,
            rect_id: 0,
        };
        draw_rect(&mut frame, &rect);

        let at = |x: usize, y: usize| &frame.data()[(y * 40 + x) * 4..(y * 40 + x) * 4 + 4];
        assert_eq!(at(20, 20), &[0, 0, 0, 0]);
        assert_eq!(at(10, 20), &RECT_COLOR);
    }
}
