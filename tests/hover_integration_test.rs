use cgmath::{Deg, Vector2};
use orbit_viewer::{
    camera::{Camera, Projection, pointer_to_ndc},
    data_structures::colour::Rgb,
    highlight::Emissive,
    resources::{load_scene, scene::parse_document},
    viewer::Viewer,
};
use winit::dpi::{PhysicalPosition, PhysicalSize};

use crate::common::test_utils::{GLOW, TempDir, two_quads_glb, unplaced_config};

mod common;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn loaded_viewer() -> Viewer {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(&two_quads_glb()).unwrap();
    let scene = parse_document(&document, &[blob.unwrap()], Vec::new(), "two_quads.glb").unwrap();
    let mut viewer = Viewer::new(&unplaced_config());
    assert!(viewer.on_load_result(Ok(scene)));
    viewer
}

fn camera() -> (Camera, Projection) {
    (
        Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0)),
        Projection::new(WIDTH, HEIGHT, Deg(40.0), 1.0, 100.0),
    )
}

/// Move the pointer to a pixel and run the frame's hover step.
fn hover_pixel(viewer: &mut Viewer, x: f64, y: f64) -> bool {
    let (camera, projection) = camera();
    let ndc = pointer_to_ndc(PhysicalPosition::new(x, y), PhysicalSize::new(WIDTH, HEIGHT));
    viewer.update_hover(camera.cast_ray(ndc, &projection))
}

#[test]
fn pointer_starts_at_the_screen_centre() {
    let centre = pointer_to_ndc(PhysicalPosition::new(400.0, 300.0), PhysicalSize::new(WIDTH, HEIGHT));
    assert_eq!(centre, Vector2::new(0.0, 0.0));
    let corner = pointer_to_ndc(PhysicalPosition::new(0.0, 0.0), PhysicalSize::new(WIDTH, HEIGHT));
    assert_eq!(corner, Vector2::new(-1.0, 1.0));
}

#[test]
fn hovering_highlights_the_nearest_mesh() {
    let mut viewer = loaded_viewer();
    assert!(hover_pixel(&mut viewer, 400.0, 300.0));

    let scene = viewer.scene().unwrap();
    let hits = scene.raycast(&camera().0.cast_ray(Vector2::new(0.0, 0.0), &camera().1).unwrap());
    assert_eq!(hits.len(), 2);
    let highlighted = viewer.hover().current().unwrap();
    assert_eq!(highlighted.id, hits[0].id);
    assert_eq!(scene.mesh(highlighted.id).unwrap().name, "front/0");
    assert_eq!(scene.emissive(highlighted.id), Some(viewer.hover().colour()));
    assert_eq!(viewer.hover().colour(), Rgb::from_hex(0xff0000));
}

#[test]
fn leaving_restores_the_exact_emissive() {
    let mut viewer = loaded_viewer();
    hover_pixel(&mut viewer, 400.0, 300.0);
    let saved = viewer.hover().current().unwrap();
    assert_eq!(saved.saved, Rgb::from(GLOW));

    // Top left corner misses both quads
    assert!(hover_pixel(&mut viewer, 10.0, 10.0));
    assert!(viewer.hover().current().is_none());
    assert_eq!(viewer.scene().unwrap().emissive(saved.id), Some(Rgb::from(GLOW)));
}

#[test]
fn at_most_one_mesh_is_highlighted() {
    let mut viewer = loaded_viewer();
    let highlight = viewer.hover().colour();
    for (x, y) in [(400.0, 300.0), (10.0, 10.0), (405.0, 305.0), (400.0, 300.0)] {
        hover_pixel(&mut viewer, x, y);
        let scene = viewer.scene().unwrap();
        let lit = (0..scene.mesh_count())
            .filter(|&id| scene.emissive(id) == Some(highlight))
            .count();
        assert!(lit <= 1);
    }
}

#[test]
fn resizing_keeps_the_aspect_ratio() {
    let (_, mut projection) = camera();
    for (width, height) in [(1920, 1080), (300, 900), (1, 1)] {
        projection.resize(width, height);
        assert_eq!(projection.aspect(), width as f32 / height as f32);
    }
    projection.resize(0, 500);
    assert_eq!(projection.aspect(), 1.0);
}

#[tokio::test]
async fn loads_a_glb_from_the_asset_root() {
    let dir = TempDir::new("glb");
    std::fs::create_dir_all(dir.0.join("models")).unwrap();
    std::fs::write(dir.0.join("models/two_quads.glb"), two_quads_glb()).unwrap();

    let scene = load_scene("models/two_quads.glb", dir.path()).await.unwrap();
    assert_eq!(scene.primitive_count(), 2);
    // "glow" plus the default material for the back quad
    assert_eq!(scene.materials.len(), 2);
}

#[tokio::test]
async fn failed_loads_leave_the_viewer_empty() {
    let dir = TempDir::new("missing");
    let result = load_scene("nothing_here.glb", dir.path()).await;

    let mut viewer = Viewer::new(&unplaced_config());
    assert!(!viewer.on_load_result(result));
    assert!(viewer.scene().is_none());
    assert!(!hover_pixel(&mut viewer, 400.0, 300.0));
}
