//! View-configuration nodes: 3D views, slice views, cameras, folders, clip
//!
//! Views and their camera/slice nodes are associated purely by a string
//! layout name ("Red", "Green", "Yellow", "View1", ...). The layout name is
//! persisted with the scene so bindings reconnect after save/restore.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::plane::{ClipCombine, ClipSide, Plane};
use crate::geometry::ClipMethod;

use super::node::NodeBase;

/// Stereo rendering mode of a 3D view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StereoType {
    NoStereo,
    RedBlue,
    Anaglyph,
    QuadBuffer,
}

impl Default for StereoType {
    fn default() -> Self {
        StereoType::NoStereo
    }
}

/// Projection mode of a 3D view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    Perspective,
    Orthographic,
}

/// Per-3D-view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewNode {
    pub base: NodeBase,
    /// Layout name identifying this view ("View1", ...)
    pub layout_name: String,
    pub background_color: Vec3,
    /// Second gradient color; equal to `background_color` for a flat fill
    pub background_color2: Vec3,
    /// Show the scene bounding box
    pub box_visible: bool,
    /// Show the R/A/S axis labels
    pub axis_labels_visible: bool,
    pub render_mode: RenderMode,
    pub stereo_type: StereoType,
}

impl ViewNode {
    pub fn new(layout_name: impl Into<String>) -> Self {
        Self {
            base: NodeBase::named("View"),
            layout_name: layout_name.into(),
            background_color: Vec3::new(0.7568, 0.7647, 0.9098),
            background_color2: Vec3::new(0.4549, 0.4705, 0.7450),
            box_visible: true,
            axis_labels_visible: true,
            render_mode: RenderMode::Perspective,
            stereo_type: StereoType::NoStereo,
        }
    }
}

/// Per-slice-view configuration, including the slice-to-RAS pose
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceNode {
    pub base: NodeBase,
    /// Layout name identifying this slice ("Red", "Green", "Yellow", ...)
    pub layout_name: String,
    /// Pose of the slice plane: slice XY coordinates to RAS
    pub slice_to_ras: Mat4,
    /// Show the slice-plane proxy model in 3D views
    pub visible_in_3d: bool,
    /// Show the interactive reformat widget in 3D views
    pub widget_visible: bool,
}

impl SliceNode {
    pub fn new(layout_name: impl Into<String>, slice_to_ras: Mat4) -> Self {
        Self {
            base: NodeBase::named("Slice"),
            layout_name: layout_name.into(),
            slice_to_ras,
            visible_in_3d: false,
            widget_visible: false,
        }
    }

    /// Axial slice at the origin
    pub fn axial(layout_name: impl Into<String>) -> Self {
        Self::new(layout_name, Mat4::IDENTITY)
    }

    /// The slice plane in RAS space
    pub fn plane(&self) -> Plane {
        Plane::from_slice_to_ras(&self.slice_to_ras)
    }
}

/// Per-3D-view camera state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraNode {
    pub base: NodeBase,
    /// Layout name of the 3D view this camera drives
    pub layout_name: String,
    pub position: Vec3,
    pub focal_point: Vec3,
    pub view_up: Vec3,
    /// Vertical view angle in degrees (perspective)
    pub view_angle: f32,
    pub parallel_projection: bool,
    pub parallel_scale: f32,
}

impl CameraNode {
    pub fn new(layout_name: impl Into<String>) -> Self {
        Self {
            base: NodeBase::named("Camera"),
            layout_name: layout_name.into(),
            position: Vec3::new(0.0, 500.0, 0.0),
            focal_point: Vec3::ZERO,
            view_up: Vec3::new(0.0, 0.0, 1.0),
            view_angle: 30.0,
            parallel_projection: false,
            parallel_scale: 1.0,
        }
    }

    /// Unit direction the camera looks along
    pub fn view_direction(&self) -> Vec3 {
        (self.focal_point - self.position).normalize_or_zero()
    }
}

/// Hierarchy folder overriding visibility/opacity for nested displayables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderNode {
    pub base: NodeBase,
    /// Folder-level visibility, ANDed into nested nodes
    pub visibility: bool,
    /// Folder-level opacity, multiplied into nested nodes
    pub opacity: f32,
}

impl FolderNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: NodeBase::named(name),
            visibility: true,
            opacity: 1.0,
        }
    }
}

/// Scene-wide slice-plane clipping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipNode {
    pub base: NodeBase,
    pub combine: ClipCombine,
    pub method: ClipMethod,
    /// Clip state per slice layout name, in (Red, Green, Yellow) order
    pub red_state: ClipSide,
    pub green_state: ClipSide,
    pub yellow_state: ClipSide,
}

impl ClipNode {
    pub fn new() -> Self {
        Self {
            base: NodeBase::named("Clip"),
            combine: ClipCombine::Intersection,
            method: ClipMethod::StraightCut,
            red_state: ClipSide::Off,
            green_state: ClipSide::Off,
            yellow_state: ClipSide::Off,
        }
    }

    /// Clip state of the slice with the given layout name
    pub fn state_for_layout(&self, layout_name: &str) -> ClipSide {
        match layout_name {
            "Red" => self.red_state,
            "Green" => self.green_state,
            "Yellow" => self.yellow_state,
            _ => ClipSide::Off,
        }
    }
}

impl Default for ClipNode {
    fn default() -> Self {
        Self::new()
    }
}
