//! WGSL shaders for text sprites

/// Draws one coverage texture per instance as a tinted quad.
///
/// Positions are raw pixels relative to the viewport center; the `scale`
/// uniform maps them to clip space. A texture may be larger than its
/// sprite, so each instance carries the UV extent of the used region.
pub const TEXT_SPRITE_SHADER: &str = r#"
struct Globals {
    scale: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var sprite_sampler: sampler;
@group(1) @binding(0) var sprite_texture: texture_2d<f32>;

struct SpriteInstance {
    @location(0) center: vec2<f32>,
    @location(1) size: vec2<f32>,
    @location(2) color: vec4<f32>,
    @location(3) uv_max: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32, sprite: SpriteInstance) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, -0.5),
        vec2<f32>(-0.5, 0.5),
        vec2<f32>(-0.5, 0.5),
        vec2<f32>(0.5, -0.5),
        vec2<f32>(0.5, 0.5),
    );
    let corner = corners[vertex_index];

    var out: VertexOutput;
    let position = (sprite.center + corner * sprite.size) * globals.scale;
    out.position = vec4<f32>(position, 0.0, 1.0);
    out.uv = (corner + vec2<f32>(0.5, 0.5)) * sprite.uv_max;
    out.color = sprite.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let coverage = textureSample(sprite_texture, sprite_sampler, in.uv).r;
    return in.color * coverage;
}
"#;
