//! Renderer: the actor store and draw-submission surface managers target
//!
//! Rendering algorithms are outside this layer; the renderer's contract is
//! the ordered visible-actor list a draw submission produces, plus the draw
//! counter the coalescing invariant is verified against.

use std::collections::HashMap;

use glam::Vec3;

use crate::dmml::StereoType;

use super::actor::{Actor, DrawGroup};
use super::camera::{Ray, RenderCamera};

/// Handle of an actor within one renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

#[derive(Debug)]
struct ActorSlot {
    actor: Actor,
    /// Insertion sequence, the tie-breaker within a draw group
    seq: u64,
}

/// One renderer bound to one view
#[derive(Debug, Default)]
pub struct Renderer {
    actors: HashMap<ActorId, ActorSlot>,
    next_id: u64,
    next_seq: u64,
    pub camera: RenderCamera,
    pub background_color: Vec3,
    pub background_color2: Vec3,
    pub stereo_type: StereoType,
    /// Viewport size in pixels
    pub size: (u32, u32),
    draw_count: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            size: (512, 512),
            ..Self::default()
        }
    }

    /// Adds an actor, returning its handle
    pub fn add_actor(&mut self, actor: Actor) -> ActorId {
        self.next_id += 1;
        self.next_seq += 1;
        let id = ActorId(self.next_id);
        self.actors.insert(
            id,
            ActorSlot {
                actor,
                seq: self.next_seq,
            },
        );
        id
    }

    /// Removes an actor; missing handles are ignored
    pub fn remove_actor(&mut self, id: ActorId) -> Option<Actor> {
        self.actors.remove(&id).map(|slot| slot.actor)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id).map(|slot| &slot.actor)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id).map(|slot| &mut slot.actor)
    }

    /// Number of actors in the store
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// All actor handles with their actors, unordered
    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &Actor)> {
        self.actors.iter().map(|(id, slot)| (*id, &slot.actor))
    }

    /// Visible actors in draw order: by group, then insertion sequence
    pub fn draw_order(&self) -> Vec<ActorId> {
        let mut visible: Vec<(&ActorId, &ActorSlot)> = self
            .actors
            .iter()
            .filter(|(_, slot)| slot.actor.visible)
            .collect();
        visible.sort_by_key(|(_, slot)| (slot.actor.group, slot.seq));
        visible.into_iter().map(|(id, _)| *id).collect()
    }

    /// Submits one draw, returning the ordered visible actors
    pub fn render(&mut self) -> Vec<ActorId> {
        self.draw_count += 1;
        self.draw_order()
    }

    /// Number of draw submissions so far
    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    /// Aspect ratio of the viewport
    pub fn aspect(&self) -> f32 {
        let (w, h) = self.size;
        if h == 0 {
            1.0
        } else {
            w as f32 / h as f32
        }
    }

    /// World-space ray through a pixel position
    pub fn screen_ray(&self, x: f32, y: f32) -> Ray {
        let (w, h) = self.size;
        let sx = if w == 0 { 0.5 } else { x / w as f32 };
        let sy = if h == 0 { 0.5 } else { y / h as f32 };
        self.camera.screen_ray(sx, sy, self.aspect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::actor::RenderGeometry;
    use crate::geometry::PolyMesh;

    fn cube_actor(group: DrawGroup) -> Actor {
        Actor::new(
            RenderGeometry::from_poly_mesh(&PolyMesh::cube(Vec3::ZERO, 1.0)),
            group,
        )
    }

    #[test]
    fn test_draw_order_puts_slice_proxies_first() {
        let mut renderer = Renderer::new();
        let regular = renderer.add_actor(cube_actor(DrawGroup::Regular));
        let proxy = renderer.add_actor(cube_actor(DrawGroup::SliceProxy));
        let furniture = renderer.add_actor(cube_actor(DrawGroup::Furniture));
        assert_eq!(renderer.draw_order(), vec![proxy, regular, furniture]);
    }

    #[test]
    fn test_hidden_actors_are_not_drawn() {
        let mut renderer = Renderer::new();
        let a = renderer.add_actor(cube_actor(DrawGroup::Regular));
        let b = renderer.add_actor(cube_actor(DrawGroup::Regular));
        renderer.actor_mut(a).unwrap().visible = false;
        assert_eq!(renderer.draw_order(), vec![b]);
    }

    #[test]
    fn test_render_bumps_draw_count() {
        let mut renderer = Renderer::new();
        assert_eq!(renderer.draw_count(), 0);
        renderer.render();
        renderer.render();
        assert_eq!(renderer.draw_count(), 2);
    }
}
