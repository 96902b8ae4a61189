//! Display nodes: the visual-property bag of one displayable node
//!
//! Effective visibility in a given view is the product of the global flag,
//! the per-view-type flag, the folder-hierarchy composition, and per-view
//! applicability (an explicit view list restricts the node to those views).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::node::{NodeBase, NodeId};

/// How a model shows up inside 2D slice views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceDisplayMode {
    /// True intersection contour with the slice plane
    Intersection,
    /// Whole geometry flattened onto the slice plane
    Projection,
    /// Flattened, colored by signed distance to the plane
    DistanceEncodedProjection,
}

/// Visual-property node referencing its owning displayable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDisplayNode {
    pub base: NodeBase,
    /// Owning displayable node, by ID (back-reference)
    pub displayable_id: Option<NodeId>,

    /// Master visibility switch
    pub visibility: bool,
    /// Visibility in 3D renderer views
    pub visibility_3d: bool,
    /// Visibility in 2D slice views
    pub visibility_2d: bool,
    /// Restricts this display to the listed views; empty means all views
    pub view_node_ids: Vec<NodeId>,

    pub color: Vec3,
    pub opacity: f32,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub specular_power: f32,
    /// HSV offset applied to `color` for back-facing geometry
    pub backface_hsv_offset: Vec3,

    /// Color points by the active scalar array instead of the flat color
    pub scalar_visibility: bool,
    /// Name of the scalar array to map
    pub active_scalar: Option<String>,
    /// Scalar values mapped across the color ramp
    pub scalar_range: [f32; 2],
    /// Ramp endpoints for scalar coloring and distance encoding
    pub ramp_below_color: Vec3,
    pub ramp_above_color: Vec3,

    /// Participate in slice-plane clipping
    pub clipping: bool,

    pub slice_display_mode: SliceDisplayMode,
    /// Line width of slice intersection contours
    pub slice_intersection_thickness: f32,
    /// Half-width of the distance-encoding ramp, in RAS units
    pub distance_range: f32,
}

impl ModelDisplayNode {
    /// Creates a display node with everything visible and default styling
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: NodeBase::named(name),
            displayable_id: None,
            visibility: true,
            visibility_3d: true,
            visibility_2d: true,
            view_node_ids: Vec::new(),
            color: Vec3::new(0.5, 0.5, 0.5),
            opacity: 1.0,
            ambient: 0.0,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 1.0,
            backface_hsv_offset: Vec3::new(-0.3, 0.0, 0.0),
            scalar_visibility: false,
            active_scalar: None,
            scalar_range: [0.0, 1.0],
            ramp_below_color: Vec3::new(0.0, 0.0, 1.0),
            ramp_above_color: Vec3::new(1.0, 0.0, 0.0),
            clipping: false,
            slice_display_mode: SliceDisplayMode::Intersection,
            slice_intersection_thickness: 1.0,
            distance_range: 10.0,
        }
    }

    /// True if this display applies to the given view node
    ///
    /// An empty view list means the display is applicable everywhere.
    pub fn applies_to_view(&self, view_id: &NodeId) -> bool {
        self.view_node_ids.is_empty() || self.view_node_ids.contains(view_id)
    }

    /// Backface color: the display color shifted in HSV space
    pub fn backface_color(&self) -> Vec3 {
        let (h, s, v) = rgb_to_hsv(self.color);
        let h = (h + self.backface_hsv_offset.x).rem_euclid(1.0);
        let s = (s + self.backface_hsv_offset.y).clamp(0.0, 1.0);
        let v = (v + self.backface_hsv_offset.z).clamp(0.0, 1.0);
        hsv_to_rgb(h, s, v)
    }
}

fn rgb_to_hsv(rgb: Vec3) -> (f32, f32, f32) {
    let max = rgb.x.max(rgb.y).max(rgb.z);
    let min = rgb.x.min(rgb.y).min(rgb.z);
    let delta = max - min;
    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= 0.0 {
        0.0
    } else if max == rgb.x {
        ((rgb.y - rgb.z) / delta).rem_euclid(6.0) / 6.0
    } else if max == rgb.y {
        ((rgb.z - rgb.x) / delta + 2.0) / 6.0
    } else {
        ((rgb.x - rgb.y) / delta + 4.0) / 6.0
    };
    (h, s, v)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let h6 = h * 6.0;
    let c = v * s;
    let x = c * (1.0 - (h6.rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h6 as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Vec3::new(r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_to_view_with_empty_list() {
        let display = ModelDisplayNode::new("d");
        assert!(display.applies_to_view(&NodeId::new("View1")));
    }

    #[test]
    fn test_applies_to_view_with_restriction() {
        let mut display = ModelDisplayNode::new("d");
        display.view_node_ids.push(NodeId::new("View1"));
        assert!(display.applies_to_view(&NodeId::new("View1")));
        assert!(!display.applies_to_view(&NodeId::new("View2")));
    }

    #[test]
    fn test_hsv_round_trip() {
        for rgb in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.2, 0.7, 0.4),
            Vec3::new(0.5, 0.5, 0.5),
        ] {
            let (h, s, v) = rgb_to_hsv(rgb);
            let back = hsv_to_rgb(h, s, v);
            assert!((back - rgb).length() < 1e-4, "{rgb:?} -> {back:?}");
        }
    }

    #[test]
    fn test_backface_color_differs_for_saturated_color() {
        let mut display = ModelDisplayNode::new("d");
        display.color = Vec3::new(1.0, 0.0, 0.0);
        assert!((display.backface_color() - display.color).length() > 1e-3);
    }
}
