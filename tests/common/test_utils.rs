//! In-memory glTF fixtures.

use orbit_viewer::config::ViewerConfig;

/// Two unit quads facing +z: "back" at z = 0 with the default material and
/// "front" at z = 1 with an emissive "glow" material.
const TWO_QUADS: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0, 1] }],
    "nodes": [
        { "name": "back", "mesh": 0 },
        { "name": "front", "mesh": 1, "translation": [0.0, 0.0, 1.0] }
    ],
    "meshes": [
        { "name": "back", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] },
        { "name": "front", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }] }
    ],
    "materials": [{ "name": "glow", "emissiveFactor": [0.1, 0.2, 0.3] }],
    "accessors": [
        { "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
          "min": [-0.5, -0.5, 0.0], "max": [0.5, 0.5, 0.0] },
        { "bufferView": 1, "componentType": 5123, "count": 6, "type": "SCALAR" }
    ],
    "bufferViews": [
        { "buffer": 0, "byteOffset": 0, "byteLength": 48 },
        { "buffer": 0, "byteOffset": 48, "byteLength": 12 }
    ],
    "buffers": [{ "byteLength": 60 }]
}"#;

pub const GLOW: [f32; 3] = [0.1, 0.2, 0.3];

fn quad_buffer() -> Vec<u8> {
    let positions: [f32; 12] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
    let mut bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
    bytes.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    bytes
}

/// Pack a JSON document and its binary buffer into a GLB container.
pub fn pack_glb(json: &str, bin: &[u8]) -> Vec<u8> {
    fn chunk(kind: &[u8; 4], mut data: Vec<u8>, pad: u8) -> Vec<u8> {
        while data.len() % 4 != 0 {
            data.push(pad);
        }
        let mut out = (data.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend(data);
        out
    }
    let json = chunk(b"JSON", json.as_bytes().to_vec(), b' ');
    let bin = chunk(b"BIN\0", bin.to_vec(), 0);

    let mut glb = b"glTF".to_vec();
    glb.extend(2u32.to_le_bytes());
    glb.extend(((12 + json.len() + bin.len()) as u32).to_le_bytes());
    glb.extend(json);
    glb.extend(bin);
    glb
}

pub fn two_quads_glb() -> Vec<u8> {
    pack_glb(TWO_QUADS, &quad_buffer())
}

/// Default configuration with the model left untransformed.
pub fn unplaced_config() -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.model.position = [0.0; 3];
    config.model.scale = [1.0; 3];
    config
}

/// A fresh directory under the system temp dir, removed on drop.
pub struct TempDir(pub std::path::PathBuf);

impl TempDir {
    pub fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("orbit-viewer-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    pub fn path(&self) -> &str {
        self.0.to_str().unwrap()
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
