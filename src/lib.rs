//! Panorama scene graph and minimap coordinate sync engine.
//!
//! This crate is the logic layer of a panoramic-tour viewer. It keeps a graph
//! of panorama scenes linked by hotspots, keeps the renderer camera and the
//! application's view state consistent, maps node positions between survey
//! pixels and minimap percentages, and re-settles the viewer when the floor
//! or survey date changes. The panorama renderer itself and the site API are
//! collaborators reached through the [`renderer::PanoramaRenderer`] and
//! [`api::SiteApi`] traits.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::ViewerCore`]: intents in, actions out |
//! | [`coordinator`] | Floor and survey-date switching |
//! | [`editor`] | Admin node repositioning and compensated save |
//! | [`markers`] | Minimap marker list for the UI |
//! | [`view`] | Renderer camera ⇄ view state binding |
//! | [`graph`] | Scene records, lazy materialization, hotspot queries |
//! | [`nearest`] | Nearest-node entry point selection |
//! | [`coords`] | Pixel/percent transforms, clamping, rotation units |
//! | [`timeline`] | Survey grouping, floor set union, date fallback |
//! | [`gate`] | Last-request-wins request slot |
//! | [`renderer`] | Renderer trait, scene descriptors, hotspot elements |
//! | [`api`] | Site API trait, wire types, [`api::ApiError`] |
//! | [`http`] | reqwest implementation of the site API |
//! | [`config`] | Client environment config and per-site viewer settings |
//! | [`node`] | Normalized node entity and calibration data |
//! | [`consts`] | Shared numeric constants |

pub mod api;
pub mod config;
pub mod consts;
pub mod coordinator;
pub mod coords;
pub mod editor;
pub mod engine;
pub mod gate;
pub mod graph;
pub mod http;
pub mod markers;
pub mod nearest;
pub mod node;
pub mod renderer;
pub mod timeline;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;
