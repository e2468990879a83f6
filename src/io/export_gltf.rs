// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! GLTF/GLB exporter

use crate::error::{DddError, Result};
use crate::geometry::Mesh;
use crate::node::{Material, Node, SceneNode, Transform};
use crate::ops2d;
use ahash::AHashMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value as Json};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const GLB_MAGIC: u32 = 0x46546C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E4942; // "BIN\0"

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Export the tree to GLB when `path` ends in `.glb`, otherwise to a
/// self-contained GLTF with the buffer embedded as a data URI
pub fn export(root: &Node, path: &Path) -> Result<()> {
    let binary = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("glb"));
    if binary {
        std::fs::write(path, to_glb(root)?)?;
    } else {
        std::fs::write(path, to_gltf_string(root)?)?;
    }
    debug!(path = %path.display(), "Scene exported");
    Ok(())
}

/// GLB bytes for the tree
pub fn to_glb(root: &Node) -> Result<Vec<u8>> {
    let (mut gltf, buffer_data) = build(root)?;
    if !buffer_data.is_empty() {
        gltf["buffers"] = json!([{ "byteLength": buffer_data.len() }]);
    }

    let json_string = serde_json::to_string(&gltf)?;
    let mut json_offset = json_string.len();
    align_to_multiple_of_four(&mut json_offset);
    let json_padding = json_offset - json_string.len();

    let mut buffer_offset = buffer_data.len();
    align_to_multiple_of_four(&mut buffer_offset);
    let buffer_padding = buffer_offset - buffer_data.len();

    let bin_chunk = if buffer_data.is_empty() { 0 } else { 8 + buffer_offset };
    let total_length = 12 + 8 + json_offset + bin_chunk;
    let mut out = Vec::with_capacity(total_length);

    // GLB header
    out.write_all(&GLB_MAGIC.to_le_bytes())?;
    out.write_all(&2u32.to_le_bytes())?;
    out.write_all(&(total_length as u32).to_le_bytes())?;

    out.write_all(&(json_offset as u32).to_le_bytes())?;
    out.write_all(&CHUNK_JSON.to_le_bytes())?;
    out.write_all(json_string.as_bytes())?;
    out.extend(std::iter::repeat(b' ').take(json_padding));

    if !buffer_data.is_empty() {
        out.write_all(&(buffer_offset as u32).to_le_bytes())?;
        out.write_all(&CHUNK_BIN.to_le_bytes())?;
        out.write_all(&buffer_data)?;
        out.extend(std::iter::repeat(0u8).take(buffer_padding));
    }

    Ok(out)
}

/// Pretty-printed GLTF JSON with an embedded buffer
pub fn to_gltf_string(root: &Node) -> Result<String> {
    let (mut gltf, buffer_data) = build(root)?;
    if !buffer_data.is_empty() {
        gltf["buffers"] = json!([{
            "byteLength": buffer_data.len(),
            "uri": format!("data:application/octet-stream;base64,{}", STANDARD.encode(&buffer_data)),
        }]);
    }
    Ok(serde_json::to_string_pretty(&gltf)?)
}

/// Write the GLTF JSON next to a separate `.bin` buffer file
pub fn export_separate(root: &Node, path: &Path) -> Result<()> {
    let (mut gltf, buffer_data) = build(root)?;
    let bin_path = path.with_extension("bin");
    if !buffer_data.is_empty() {
        let uri = bin_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.bin".to_string());
        gltf["buffers"] = json!([{ "byteLength": buffer_data.len(), "uri": uri }]);
        std::fs::write(&bin_path, &buffer_data)?;
    }
    let mut file = File::create(path)?;
    file.write_all(serde_json::to_string_pretty(&gltf)?.as_bytes())?;
    Ok(())
}

fn build(root: &Node) -> Result<(Json, Vec<u8>)> {
    let mut builder = GltfBuilder::default();
    let root_index = builder.visit(root)?;
    Ok((builder.finish(root_index), builder.buffer))
}

#[derive(Default)]
struct GltfBuilder {
    nodes: Vec<Json>,
    meshes: Vec<Json>,
    materials: Vec<Json>,
    images: Vec<Json>,
    accessors: Vec<Json>,
    buffer_views: Vec<Json>,
    buffer: Vec<u8>,
    material_index: AHashMap<String, usize>,
    /// Mesh index per prototype, keyed by the prototype's address
    prototype_meshes: AHashMap<usize, Option<usize>>,
}

impl GltfBuilder {
    fn visit(&mut self, node: &Node) -> Result<usize> {
        let mut entry = Map::new();
        if let Some(name) = node.name() {
            entry.insert("name".into(), json!(name));
        }
        if !node.attrs().is_empty() {
            let extras: Map<String, Json> = node
                .attrs()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            entry.insert("extras".into(), Json::Object(extras));
        }

        let material = node.get_material().cloned();
        match node {
            Node::D3(n) => {
                write_transform(&mut entry, &n.transform);
                if let Some(mesh) = n.mesh.as_ref().filter(|m| !m.is_empty()) {
                    let index = self.add_mesh(mesh, material.as_ref(), node.name());
                    entry.insert("mesh".into(), json!(index));
                }
            }
            Node::D2(n) => {
                if n.geom.is_polygonal() {
                    match ops2d::triangulate(&n.geom, 0.0, false) {
                        Ok(mesh) if !mesh.is_empty() => {
                            let index = self.add_mesh(&mesh, material.as_ref(), node.name());
                            entry.insert("mesh".into(), json!(index));
                        }
                        Ok(_) => {}
                        Err(e) => warn!(node = %n.label(), error = %e, "Skipping planar geometry"),
                    }
                }
            }
            Node::Instance(inst) => {
                if !inst.transform.has_unit_scale() {
                    return Err(DddError::Export(format!(
                        "instance {} has non-unit scale {:?}",
                        inst.label(),
                        inst.transform.scale.as_slice()
                    )));
                }
                write_transform(&mut entry, &inst.transform);
                match inst.prototype() {
                    Some(proto) => {
                        if let Some(index) = self.prototype_mesh(&proto) {
                            entry.insert("mesh".into(), json!(index));
                        }
                    }
                    None => warn!(node = %inst.label(), "Instance prototype is gone, exported empty"),
                }
            }
        }

        let index = self.nodes.len();
        self.nodes.push(Json::Null);
        let children = node
            .children()
            .iter()
            .map(|child| self.visit(child))
            .collect::<Result<Vec<usize>>>()?;
        if !children.is_empty() {
            entry.insert("children".into(), json!(children));
        }
        self.nodes[index] = Json::Object(entry);
        Ok(index)
    }

    /// One mesh shared by every instance of the same prototype
    fn prototype_mesh(&mut self, proto: &Arc<Node>) -> Option<usize> {
        let key = Arc::as_ptr(proto) as usize;
        if let Some(index) = self.prototype_meshes.get(&key) {
            return *index;
        }
        let index = match proto.as_ref() {
            Node::D3(n) => {
                let mesh = n.combined_mesh();
                (!mesh.is_empty())
                    .then(|| self.add_mesh(&mesh, proto.get_material(), proto.name()))
            }
            _ => None,
        };
        self.prototype_meshes.insert(key, index);
        index
    }

    fn add_mesh(&mut self, mesh: &Mesh, material: Option<&Arc<Material>>, name: Option<&str>) -> usize {
        let (min_pos, max_pos) = calculate_bounds(mesh);

        let positions = self.push_view(
            mesh.vertices.iter().flat_map(|v| {
                [v.position.x as f32, v.position.y as f32, v.position.z as f32]
            }),
            ARRAY_BUFFER,
        );
        let position_accessor = self.push_accessor(json!({
            "bufferView": positions,
            "componentType": FLOAT,
            "count": mesh.vertices.len(),
            "type": "VEC3",
            "min": min_pos,
            "max": max_pos,
        }));

        let normals = self.push_view(
            mesh.vertices
                .iter()
                .flat_map(|v| [v.normal.x as f32, v.normal.y as f32, v.normal.z as f32]),
            ARRAY_BUFFER,
        );
        let normal_accessor = self.push_accessor(json!({
            "bufferView": normals,
            "componentType": FLOAT,
            "count": mesh.vertices.len(),
            "type": "VEC3",
        }));

        let mut attributes = Map::new();
        attributes.insert("POSITION".into(), json!(position_accessor));
        attributes.insert("NORMAL".into(), json!(normal_accessor));

        if mesh.has_uvs() {
            let uvs = self.push_view(
                mesh.vertices.iter().flat_map(|v| {
                    let uv = v.uv.unwrap_or_default();
                    // GLTF puts the V origin at the top of the image
                    [uv[0] as f32, (1.0 - uv[1]) as f32]
                }),
                ARRAY_BUFFER,
            );
            let uv_accessor = self.push_accessor(json!({
                "bufferView": uvs,
                "componentType": FLOAT,
                "count": mesh.vertices.len(),
                "type": "VEC2",
            }));
            attributes.insert("TEXCOORD_0".into(), json!(uv_accessor));
        }

        let indices_offset = self.buffer.len();
        for triangle in &mesh.triangles {
            for i in triangle.indices {
                self.buffer.extend_from_slice(&(i as u32).to_le_bytes());
            }
        }
        let indices = self.buffer_views.len();
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": indices_offset,
            "byteLength": self.buffer.len() - indices_offset,
            "target": ELEMENT_ARRAY_BUFFER,
        }));
        let indices_accessor = self.push_accessor(json!({
            "bufferView": indices,
            "componentType": UNSIGNED_INT,
            "count": mesh.triangles.len() * 3,
            "type": "SCALAR",
        }));

        let mut primitive = json!({
            "attributes": attributes,
            "indices": indices_accessor,
            "mode": 4,
        });
        if let Some(material) = material {
            primitive["material"] = json!(self.material(material));
        }

        let mut entry = json!({ "primitives": [primitive] });
        if let Some(name) = name {
            entry["name"] = json!(name);
        }
        self.meshes.push(entry);
        self.meshes.len() - 1
    }

    fn push_view(&mut self, values: impl Iterator<Item = f32>, target: u32) -> usize {
        let offset = self.buffer.len();
        for value in values {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
        self.buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": self.buffer.len() - offset,
            "target": target,
        }));
        self.buffer_views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Json) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    fn material(&mut self, material: &Material) -> usize {
        if let Some(index) = self.material_index.get(&material.name) {
            return *index;
        }
        let mut pbr = json!({
            "baseColorFactor": material.color,
            "metallicFactor": material.metallic,
            "roughnessFactor": material.roughness,
        });
        if let Some(texture) = &material.texture {
            self.images.push(json!({ "uri": texture }));
            pbr["baseColorTexture"] = json!({ "index": self.images.len() - 1 });
        }
        let mut entry = json!({
            "name": material.name,
            "pbrMetallicRoughness": pbr,
            "doubleSided": material.double_sided(),
        });
        if material.color[3] < 1.0 {
            entry["alphaMode"] = json!("BLEND");
        }
        if !material.extras.is_empty() {
            let extras: Map<String, Json> = material
                .extras
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            entry["extras"] = Json::Object(extras);
        }
        self.materials.push(entry);
        let index = self.materials.len() - 1;
        self.material_index.insert(material.name.clone(), index);
        index
    }

    fn finish(&self, root: usize) -> Json {
        let mut gltf = json!({
            "asset": {
                "generator": concat!("ddd ", env!("CARGO_PKG_VERSION")),
                "version": "2.0"
            },
            "scene": 0,
            "scenes": [{ "nodes": [root] }],
            "nodes": self.nodes,
        });
        let sections = [
            ("meshes", &self.meshes),
            ("materials", &self.materials),
            ("accessors", &self.accessors),
            ("bufferViews", &self.buffer_views),
        ];
        for (key, items) in sections {
            if !items.is_empty() {
                gltf[key] = json!(items);
            }
        }
        if !self.images.is_empty() {
            gltf["images"] = json!(self.images);
            let textures: Vec<Json> = (0..self.images.len())
                .map(|i| json!({ "source": i }))
                .collect();
            gltf["textures"] = json!(textures);
        }
        gltf
    }
}

fn write_transform(entry: &mut Map<String, Json>, transform: &Transform) {
    if transform.is_identity() {
        return;
    }
    let t = transform.translation;
    let q = transform.rotation.coords;
    let s = transform.scale;
    entry.insert("translation".into(), json!([t.x, t.y, t.z]));
    entry.insert("rotation".into(), json!([q.x, q.y, q.z, q.w]));
    entry.insert("scale".into(), json!([s.x, s.y, s.z]));
}

fn calculate_bounds(mesh: &Mesh) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX, f32::MAX, f32::MAX];
    let mut max = [f32::MIN, f32::MIN, f32::MIN];

    for vertex in &mesh.vertices {
        let p = [
            vertex.position.x as f32,
            vertex.position.y as f32,
            vertex.position.z as f32,
        ];
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }

    (min, max)
}

fn align_to_multiple_of_four(n: &mut usize) {
    *n = (*n + 3) & !3;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::node::{Instance, Node3};
    use crate::shapes;
    use tempfile::tempdir;

    fn scene() -> Node {
        let brick = Material::new("brick").color_hex("#aa4422").unwrap().shared();
        let mut root = Node::group3("root");
        let house = shapes::rect([[0.0, 0.0], [4.0, 7.0]])
            .extrude(3.0)
            .unwrap()
            .named("house")
            .with("ddd:height", 3.0)
            .material(Some(brick.clone()), true);
        root.append(house);
        let mut lots = Node::group2("lots");
        lots.append(shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("lot"));
        root.append(lots);
        root
    }

    fn parse(root: &Node) -> Json {
        serde_json::from_str(&to_gltf_string(root).unwrap()).unwrap()
    }

    #[test]
    fn test_export_glb() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.glb");
        export(&scene(), &path).unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(&content[0..4], b"glTF");
        let total = u32::from_le_bytes([content[8], content[9], content[10], content[11]]);
        assert_eq!(total as usize, content.len());
        assert_eq!(content.len() % 4, 0);
    }

    #[test]
    fn test_hierarchy_names_and_extras() {
        let gltf = parse(&scene());
        let nodes = gltf["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0]["name"], "root");
        assert_eq!(nodes[0]["children"], json!([1, 2]));
        assert_eq!(nodes[1]["name"], "house");
        assert_eq!(nodes[1]["extras"]["ddd:height"], 3.0);
        assert!(nodes[1]["mesh"].is_number());
        // planar polygons are triangulated
        assert!(nodes[3]["mesh"].is_number());

        let materials = gltf["materials"].as_array().unwrap();
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0]["name"], "brick");
        let uri = gltf["buffers"][0]["uri"].as_str().unwrap();
        assert!(uri.starts_with("data:application/octet-stream;base64,"));
    }

    #[test]
    fn test_instances_share_mesh() {
        let mut catalog = Catalog::new();
        let proto = catalog
            .add("bollard", shapes::cuboid([0.0, 0.0, 0.0], [0.2, 0.2, 1.0]).into())
            .unwrap();
        let mut root = Node::group3("root");
        for x in 0..3 {
            root.append(
                Instance::new(&proto)
                    .keyed("bollard")
                    .translate([x as f64, 0.0, 0.0]),
            );
        }
        let gltf = parse(&root);
        assert_eq!(gltf["meshes"].as_array().unwrap().len(), 1);
        let nodes = gltf["nodes"].as_array().unwrap();
        assert!(nodes[1..].iter().all(|n| n["mesh"] == 0));
        assert_eq!(nodes[3]["translation"], json!([2.0, 0.0, 0.0]));
    }

    #[test]
    fn test_instance_scale_rejected() {
        let proto = Arc::new(Node::from(shapes::cuboid([0.0; 3], [1.0; 3])));
        let mut root = Node::group3("root");
        root.append(Instance::new(&proto).scale([2.0, 1.0, 1.0]));
        assert!(matches!(to_glb(&root), Err(DddError::Export(_))));
    }

    #[test]
    fn test_uvs_exported() {
        let mut mesh_node = Node3::new(shapes::cuboid([0.0; 3], [1.0; 3]).combined_mesh());
        if let Some(mesh) = &mut mesh_node.mesh {
            for v in &mut mesh.vertices {
                v.uv = Some([v.position.x, v.position.y]);
            }
        }
        let gltf = parse(&mesh_node.into());
        assert!(gltf["meshes"][0]["primitives"][0]["attributes"]["TEXCOORD_0"].is_number());
    }
}
