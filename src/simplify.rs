//! Attribute-aware mesh simplification: quadric edge collapse via the
//! `meshopt` kernel, followed by vertex-cache and overdraw reordering and
//! atomic attribute compaction.
//!
//! The kernel itself is treated as a black box (it is the one piece of this
//! pipeline bound directly to a C library's heuristics); everything around
//! it — layout detection, interleaving, compaction, bone remap — is plain
//! Rust, the same division `buf/model.rs`'s simplification path draws
//! between "call into meshopt" and "reshuffle our own buffers after".

use meshopt::{SimplifyOptions, VertexDataAdapter};
use tracing::info;

use crate::scene::{Mesh, PrimitiveKind};

/// Maximum attribute float count the kernel accepts per vertex.
const MAX_ATTR_FLOATS: usize = 32;
/// Wide interleaved record width used only for compaction (step 2 of §4.1):
/// pos(3) + normal(3) + tangent(3) + bitangent(3) + 8 uv(3) + 8 color(4).
const AOS_STRIDE: usize = 3 + 3 + 3 + 3 + 8 * 3 + 8 * 4;

const OFF_POS: usize = 0;
const OFF_NORMAL: usize = OFF_POS + 3;
const OFF_TANGENT: usize = OFF_NORMAL + 3;
const OFF_BITANGENT: usize = OFF_TANGENT + 3;
const OFF_UV: usize = OFF_BITANGENT + 3;
const OFF_COLOR: usize = OFF_UV + 8 * 3;

#[derive(Debug, Clone, Copy)]
pub struct SimplifyResult {
    pub original_tris: usize,
    pub simplified_tris: usize,
    pub error_metric: f32,
}

/// Simplifies `mesh` toward `ratio` of its original triangle count in place.
/// Non-triangle or empty meshes pass through unchanged (§4.1, P6).
pub fn simplify(mesh: &mut Mesh, ratio: f32) -> SimplifyResult {
    let original_tris = mesh.triangle_count();

    if mesh.primitive_kind != PrimitiveKind::Triangles || mesh.indices.is_empty() {
        return SimplifyResult {
            original_tris,
            simplified_tris: original_tris,
            error_metric: 0.0,
        };
    }

    let v = mesh.vertex_count();
    let aos = interleave(mesh, v);

    let positions_flat: Vec<f32> = mesh.positions.iter().flat_map(|p| *p).collect();
    let positions_bytes: &[u8] = bytemuck::cast_slice(&positions_flat);
    let adapter = VertexDataAdapter::new(positions_bytes, 12, 0)
        .expect("positions_flat is a tightly packed stride-12 f32x3 buffer");

    let (attrs_flat, attr_weights) = build_attribute_bundle(mesh, v);
    let attr_count = if v > 0 { attrs_flat.len() / v } else { 0 };
    let vertex_lock = vec![false; v];

    let target_count = ((mesh.indices.len() as f32 * ratio / 3.0).floor() as usize * 3).max(3);

    let mut error_metric = 0.0f32;
    let new_indices = meshopt::simplify_with_attributes_and_locks(
        &mesh.indices,
        &adapter,
        &attrs_flat,
        &attr_weights,
        attr_count,
        &vertex_lock,
        target_count,
        0.01,
        SimplifyOptions::empty(),
        Some(&mut error_metric),
    );

    let mut reordered = new_indices;
    meshopt::optimize_vertex_cache_in_place(&mut reordered, v);
    meshopt::optimize_overdraw_in_place(&mut reordered, &adapter, 1.05);

    let (remap, live_count) = build_compaction_remap(&reordered, v);
    for idx in reordered.iter_mut() {
        *idx = remap[*idx as usize];
    }

    let compacted_aos = compact_aos(&aos, &remap, live_count);
    unpack(mesh, &compacted_aos, live_count);
    mesh.indices = reordered;

    remap_bones(mesh, &remap);

    let simplified_tris = mesh.triangle_count();
    info!(
        mesh = %mesh.name,
        original_tris,
        simplified_tris,
        error_metric,
        "simplified mesh"
    );

    SimplifyResult {
        original_tris,
        simplified_tris,
        error_metric,
    }
}

fn interleave(mesh: &Mesh, v: usize) -> Vec<f32> {
    let mut aos = vec![0.0f32; v * AOS_STRIDE];
    for i in 0..v {
        let base = i * AOS_STRIDE;
        aos[base + OFF_POS..base + OFF_POS + 3].copy_from_slice(&mesh.positions[i]);
        if let Some(normals) = &mesh.normals {
            aos[base + OFF_NORMAL..base + OFF_NORMAL + 3].copy_from_slice(&normals[i]);
        }
        if let Some(tangents) = &mesh.tangents {
            aos[base + OFF_TANGENT..base + OFF_TANGENT + 3].copy_from_slice(&tangents[i]);
        }
        if let Some(bitangents) = &mesh.bitangents {
            aos[base + OFF_BITANGENT..base + OFF_BITANGENT + 3].copy_from_slice(&bitangents[i]);
        }
        for (c, chan) in mesh.uv_channels.iter().enumerate() {
            if let Some(uvs) = chan {
                let off = base + OFF_UV + c * 3;
                aos[off..off + 3].copy_from_slice(&uvs[i]);
            }
        }
        for (c, chan) in mesh.color_channels.iter().enumerate() {
            if let Some(colors) = chan {
                let off = base + OFF_COLOR + c * 4;
                aos[off..off + 4].copy_from_slice(&colors[i]);
            }
        }
    }
    aos
}

/// Builds the compact, budget-limited attribute array and matching weights
/// used to steer the quadric error metric (§4.1 step 4).
fn build_attribute_bundle(mesh: &Mesh, v: usize) -> (Vec<f32>, Vec<f32>) {
    let mut layout: Vec<(usize, f32)> = Vec::new(); // (float width per channel kind tag handled below, weight)
    let mut used = 0usize;

    struct Field {
        width: usize,
        weight: f32,
    }
    let mut fields: Vec<Field> = Vec::new();

    for (c, chan) in mesh.uv_channels.iter().enumerate() {
        if chan.is_none() {
            continue;
        }
        if used + 2 > MAX_ATTR_FLOATS {
            break;
        }
        let weight = if c == 0 { 1.5 } else { 0.8 };
        fields.push(Field { width: 2, weight });
        used += 2;
    }

    if mesh.normals.is_some() && used + 3 <= MAX_ATTR_FLOATS {
        fields.push(Field { width: 3, weight: 0.5 });
        used += 3;
    }

    let _ = &mut layout;
    if v == 0 || fields.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let width = used;
    let mut attrs = vec![0.0f32; v * width];
    let mut weights = vec![0.0f32; width];

    let mut cursor = 0usize;
    let mut uv_chan_iter = mesh.uv_channels.iter().filter(|c| c.is_some());
    let has_normals = mesh.normals.is_some() && fields.last().map(|f| f.width) == Some(3);

    for field in &fields {
        for w in weights[cursor..cursor + field.width].iter_mut() {
            *w = field.weight;
        }
        cursor += field.width;
    }

    cursor = 0;
    for field in &fields {
        if field.width == 2 {
            if let Some(Some(uvs)) = uv_chan_iter.next() {
                for i in 0..v {
                    attrs[i * width + cursor] = uvs[i][0];
                    attrs[i * width + cursor + 1] = uvs[i][1];
                }
            }
            cursor += 2;
        } else if field.width == 3 && has_normals {
            if let Some(normals) = &mesh.normals {
                for i in 0..v {
                    attrs[i * width + cursor..i * width + cursor + 3]
                        .copy_from_slice(&normals[i]);
                }
            }
            cursor += 3;
        }
    }

    (attrs, weights)
}

/// `remap[old_index] -> new_index`, built from the vertices actually
/// referenced by `indices` (§4.1 step 7). Returns the live vertex count.
fn build_compaction_remap(indices: &[u32], v: usize) -> (Vec<u32>, usize) {
    const SENTINEL: u32 = u32::MAX;
    let mut remap = vec![SENTINEL; v];
    let mut next = 0u32;
    for &idx in indices {
        let slot = &mut remap[idx as usize];
        if *slot == SENTINEL {
            *slot = next;
            next += 1;
        }
    }
    (remap, next as usize)
}

fn compact_aos(aos: &[f32], remap: &[u32], live_count: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; live_count * AOS_STRIDE];
    for (old, &new) in remap.iter().enumerate() {
        if new == u32::MAX {
            continue;
        }
        let src = old * AOS_STRIDE;
        let dst = new as usize * AOS_STRIDE;
        out[dst..dst + AOS_STRIDE].copy_from_slice(&aos[src..src + AOS_STRIDE]);
    }
    out
}

fn unpack(mesh: &mut Mesh, aos: &[f32], live_count: usize) {
    let had_normals = mesh.normals.is_some();
    let had_tangents = mesh.tangents.is_some();
    let had_bitangents = mesh.bitangents.is_some();
    let had_uv: Vec<bool> = mesh.uv_channels.iter().map(Option::is_some).collect();
    let had_color: Vec<bool> = mesh.color_channels.iter().map(Option::is_some).collect();

    let mut positions = Vec::with_capacity(live_count);
    let mut normals = had_normals.then(|| Vec::with_capacity(live_count));
    let mut tangents = had_tangents.then(|| Vec::with_capacity(live_count));
    let mut bitangents = had_bitangents.then(|| Vec::with_capacity(live_count));
    let mut uv_channels: [Option<Vec<[f32; 3]>>; crate::scene::MAX_UV_CHANNELS] = Default::default();
    let mut color_channels: [Option<Vec<[f32; 4]>>; crate::scene::MAX_COLOR_CHANNELS] = Default::default();
    for (c, present) in had_uv.iter().enumerate() {
        if *present {
            uv_channels[c] = Some(Vec::with_capacity(live_count));
        }
    }
    for (c, present) in had_color.iter().enumerate() {
        if *present {
            color_channels[c] = Some(Vec::with_capacity(live_count));
        }
    }

    for i in 0..live_count {
        let base = i * AOS_STRIDE;
        positions.push([aos[base], aos[base + 1], aos[base + 2]]);
        if let Some(out) = normals.as_mut() {
            out.push([aos[base + OFF_NORMAL], aos[base + OFF_NORMAL + 1], aos[base + OFF_NORMAL + 2]]);
        }
        if let Some(out) = tangents.as_mut() {
            out.push([aos[base + OFF_TANGENT], aos[base + OFF_TANGENT + 1], aos[base + OFF_TANGENT + 2]]);
        }
        if let Some(out) = bitangents.as_mut() {
            out.push([aos[base + OFF_BITANGENT], aos[base + OFF_BITANGENT + 1], aos[base + OFF_BITANGENT + 2]]);
        }
        for (c, chan) in uv_channels.iter_mut().enumerate() {
            if let Some(out) = chan {
                let off = base + OFF_UV + c * 3;
                out.push([aos[off], aos[off + 1], aos[off + 2]]);
            }
        }
        for (c, chan) in color_channels.iter_mut().enumerate() {
            if let Some(out) = chan {
                let off = base + OFF_COLOR + c * 4;
                out.push([aos[off], aos[off + 1], aos[off + 2], aos[off + 3]]);
            }
        }
    }

    mesh.positions = positions;
    mesh.normals = normals;
    mesh.tangents = tangents;
    mesh.bitangents = bitangents;
    mesh.uv_channels = uv_channels;
    mesh.color_channels = color_channels;
}

fn remap_bones(mesh: &mut Mesh, remap: &[u32]) {
    for bone in &mut mesh.bones {
        bone.weights.retain_mut(|(vertex_id, _)| {
            let new_idx = remap[*vertex_id as usize];
            if new_idx == u32::MAX {
                false
            } else {
                *vertex_id = new_idx;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PrimitiveKind;

    fn cube_mesh() -> Mesh {
        let positions = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        let indices = vec![
            0, 1, 2, 0, 2, 3, // front
            4, 6, 5, 4, 7, 6, // back
            0, 4, 5, 0, 5, 1, // bottom
            3, 2, 6, 3, 6, 7, // top
            0, 3, 7, 0, 7, 4, // left
            1, 5, 6, 1, 6, 2, // right
        ];
        Mesh {
            name: "cube".into(),
            positions,
            indices,
            primitive_kind: PrimitiveKind::Triangles,
            ..Default::default()
        }
    }

    #[test]
    fn non_triangle_mesh_passes_through_unchanged() {
        let mut mesh = cube_mesh();
        mesh.primitive_kind = PrimitiveKind::Points;
        let before_positions = mesh.positions.clone();
        let before_indices = mesh.indices.clone();
        let result = simplify(&mut mesh, 0.5);
        assert_eq!(result.original_tris, result.simplified_tris);
        assert_eq!(mesh.positions, before_positions);
        assert_eq!(mesh.indices, before_indices);
    }

    #[test]
    fn empty_indices_passes_through_unchanged() {
        let mut mesh = cube_mesh();
        mesh.indices.clear();
        let result = simplify(&mut mesh, 0.5);
        assert_eq!(result.simplified_tris, 0);
    }

    #[test]
    fn simplified_mesh_stays_well_formed() {
        let mut mesh = cube_mesh();
        let result = simplify(&mut mesh, 0.5);
        assert!(result.simplified_tris <= result.original_tris);
        assert_eq!(mesh.indices.len() % 3, 0);
        let v = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|&i| i < v));
    }

    #[test]
    fn bone_weights_stay_in_bounds_after_simplify() {
        let mut mesh = cube_mesh();
        mesh.bones.push(crate::scene::Bone {
            name: "root".into(),
            weights: (0..8).map(|i| (i as u32, 1.0)).collect(),
        });
        simplify(&mut mesh, 0.5);
        let v = mesh.vertex_count() as u32;
        for bone in &mesh.bones {
            assert!(bone.weights.iter().all(|&(id, _)| id < v));
        }
    }
}
