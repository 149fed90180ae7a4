//! Point-in-shape tests used by the rasterizer
//!
//! Coordinates are in module units; callers sample pixel centres.

use crate::style::{CornerDotStyle, CornerSquareStyle, DotStyle};

/// Dark neighbours of a data module (top, right, bottom, left)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbours {
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
    pub left: bool,
}

impl Neighbours {
    fn free_corners(self) -> [bool; 4] {
        [
            !self.top && !self.left,
            !self.top && !self.right,
            !self.bottom && !self.right,
            !self.bottom && !self.left,
        ]
    }
}

/// Axis-aligned rectangle with per-corner radii (tl, tr, br, bl)
#[derive(Debug, Clone, Copy)]
struct RoundedRect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    radii: [f32; 4],
}

impl RoundedRect {
    fn square(x: f32, y: f32, size: f32, radius: f32) -> Self {
        Self {
            x,
            y,
            w: size,
            h: size,
            radii: [radius; 4],
        }
    }

    fn contains(&self, px: f32, py: f32) -> bool {
        if px < self.x || py < self.y || px > self.x + self.w || py > self.y + self.h {
            return false;
        }

        let max_r = self.w.min(self.h) / 2.0;
        let corners = [
            (self.x, self.y, 1.0, 1.0),
            (self.x + self.w, self.y, -1.0, 1.0),
            (self.x + self.w, self.y + self.h, -1.0, -1.0),
            (self.x, self.y + self.h, 1.0, -1.0),
        ];

        for ((cx, cy, dx, dy), radius) in corners.into_iter().zip(self.radii) {
            let r = radius.min(max_r);
            if r <= 0.0 {
                continue;
            }
            let centre_x = cx + dx * r;
            let centre_y = cy + dy * r;
            let in_corner_x = (px - centre_x) * dx < 0.0;
            let in_corner_y = (py - centre_y) * dy < 0.0;
            if in_corner_x && in_corner_y && !within_circle(px, py, centre_x, centre_y, r) {
                return false;
            }
        }

        true
    }
}

fn within_circle(px: f32, py: f32, cx: f32, cy: f32, r: f32) -> bool {
    let (dx, dy) = (px - cx, py - cy);
    dx * dx + dy * dy <= r * r
}

/// Whether (u, v) in the unit cell is covered by a data dot.
pub fn dot_contains(style: DotStyle, neighbours: Neighbours, u: f32, v: f32) -> bool {
    let free = neighbours.free_corners();
    let radius_if = |corner: usize, r: f32| if free[corner] { r } else { 0.0 };

    let radii = match style {
        DotStyle::Square => return true,
        DotStyle::Dots => return within_circle(u, v, 0.5, 0.5, 0.5),
        DotStyle::Rounded => [0, 1, 2, 3].map(|c| radius_if(c, 0.3)),
        DotStyle::ExtraRounded => [0, 1, 2, 3].map(|c| radius_if(c, 0.5)),
        DotStyle::Classy => [radius_if(0, 0.5), 0.0, radius_if(2, 0.5), 0.0],
        DotStyle::ClassyRounded => [
            radius_if(0, 0.5),
            radius_if(1, 0.25),
            radius_if(2, 0.5),
            radius_if(3, 0.25),
        ],
    };

    RoundedRect {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
        radii,
    }
    .contains(u, v)
}

/// Whether (fx, fy) inside a 7x7 finder box is covered by the outer ring.
pub fn corner_square_contains(style: CornerSquareStyle, fx: f32, fy: f32) -> bool {
    match style {
        CornerSquareStyle::Square => {
            RoundedRect::square(0.0, 0.0, 7.0, 0.0).contains(fx, fy)
                && !RoundedRect::square(1.0, 1.0, 5.0, 0.0).contains(fx, fy)
        }
        CornerSquareStyle::ExtraRounded => {
            RoundedRect::square(0.0, 0.0, 7.0, 2.5).contains(fx, fy)
                && !RoundedRect::square(1.0, 1.0, 5.0, 1.5).contains(fx, fy)
        }
        CornerSquareStyle::Dot => {
            within_circle(fx, fy, 3.5, 3.5, 3.5) && !within_circle(fx, fy, 3.5, 3.5, 2.5)
        }
    }
}

/// Whether (fx, fy) inside a 7x7 finder box is covered by the inner eye.
pub fn corner_dot_contains(style: CornerDotStyle, fx: f32, fy: f32) -> bool {
    match style {
        CornerDotStyle::Square => RoundedRect::square(2.0, 2.0, 3.0, 0.0).contains(fx, fy),
        CornerDotStyle::Dot => within_circle(fx, fy, 3.5, 3.5, 1.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISOLATED: Neighbours = Neighbours {
        top: false,
        right: false,
        bottom: false,
        left: false,
    };

    const SURROUNDED: Neighbours = Neighbours {
        top: true,
        right: true,
        bottom: true,
        left: true,
    };

    #[test]
    fn square_dot_fills_cell() {
        assert!(dot_contains(DotStyle::Square, ISOLATED, 0.01, 0.01));
        assert!(dot_contains(DotStyle::Square, ISOLATED, 0.99, 0.99));
    }

    #[test]
    fn round_dots_leave_corners_empty() {
        for style in [DotStyle::Dots, DotStyle::ExtraRounded] {
            assert!(dot_contains(style, ISOLATED, 0.5, 0.5));
            assert!(!dot_contains(style, ISOLATED, 0.02, 0.02), "{style}");
        }
    }

    #[test]
    fn connected_modules_keep_square_corners() {
        for style in [
            DotStyle::Rounded,
            DotStyle::ExtraRounded,
            DotStyle::Classy,
            DotStyle::ClassyRounded,
        ] {
            assert!(dot_contains(style, SURROUNDED, 0.01, 0.01), "{style}");
            assert!(dot_contains(style, SURROUNDED, 0.99, 0.01), "{style}");
        }
    }

    #[test]
    fn classy_rounds_only_diagonal_corners() {
        assert!(!dot_contains(DotStyle::Classy, ISOLATED, 0.02, 0.02));
        assert!(dot_contains(DotStyle::Classy, ISOLATED, 0.98, 0.02));
        assert!(!dot_contains(DotStyle::Classy, ISOLATED, 0.98, 0.98));
        assert!(dot_contains(DotStyle::Classy, ISOLATED, 0.02, 0.98));
    }

    #[test]
    fn finder_ring_is_hollow() {
        for style in CornerSquareStyle::ALL {
            assert!(corner_square_contains(*style, 0.5, 3.5), "{style}");
            assert!(!corner_square_contains(*style, 3.5, 3.5), "{style}");
        }
    }

    #[test]
    fn rounded_rings_cut_outer_corner() {
        assert!(corner_square_contains(CornerSquareStyle::Square, 0.1, 0.1));
        assert!(!corner_square_contains(CornerSquareStyle::ExtraRounded, 0.1, 0.1));
        assert!(!corner_square_contains(CornerSquareStyle::Dot, 0.1, 0.1));
    }

    #[test]
    fn finder_eye_is_centred() {
        for style in CornerDotStyle::ALL {
            assert!(corner_dot_contains(*style, 3.5, 3.5), "{style}");
            assert!(!corner_dot_contains(*style, 1.5, 3.5), "{style}");
        }
        assert!(corner_dot_contains(CornerDotStyle::Square, 2.1, 2.1));
        assert!(!corner_dot_contains(CornerDotStyle::Dot, 2.1, 2.1));
    }
}
