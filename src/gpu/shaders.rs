/// WGSL shader for window/level + palette display
///
/// The fragment stage evaluates the same mapping as `WindowLevelTable`:
/// - raw value rebuilt from the integer texel (`value_min + code`)
/// - `<= lower` is black, `>= upper` is white, otherwise
///   `(raw - lower) * scale` truncated
/// - degenerate windows are black and never inverted
///
/// Color images skip the window entirely.

pub const DISPLAY_SHADER: &str = r#"
// ========== Uniforms ==========

struct DisplayParams {
    mvp: mat4x4<f32>,
    lower: f32,
    upper: f32,
    scale: f32,
    value_min: f32,
    degenerate: u32,
    is_color: u32,
    use_palette: u32,
    invert: u32,
}

@group(0) @binding(0)
var sample_texture: texture_2d<u32>;  // R8Uint / R16Uint codes, or Rgba8Uint color

@group(0) @binding(1)
var palette_texture: texture_2d<f32>;  // 256x1 RGBA lookup

@group(0) @binding(2)
var<uniform> params: DisplayParams;

// ========== Vertex Shader ==========
// Quad in image pixel coordinates, placed by the MVP matrix

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = params.mvp * vec4<f32>(input.position, 0.0, 1.0);
    output.uv = input.uv;
    return output;
}

// ========== Fragment Shader ==========

fn window_level(raw: f32) -> u32 {
    if params.degenerate != 0u {
        return 0u;
    }

    var level: u32;
    if raw <= params.lower {
        level = 0u;
    } else if raw >= params.upper {
        level = 255u;
    } else {
        level = min(u32((raw - params.lower) * params.scale), 255u);
    }

    if params.invert != 0u {
        level = 255u - level;
    }
    return level;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let dimensions = vec2<f32>(textureDimensions(sample_texture));

    // Nearest texel, no filtering on integer data
    let texel = vec2<i32>(clamp(floor(input.uv * dimensions), vec2<f32>(0.0), dimensions - 1.0));
    let texel_value = textureLoad(sample_texture, texel, 0);

    if params.is_color != 0u {
        return vec4<f32>(vec3<f32>(texel_value.rgb) / 255.0, 1.0);
    }

    let raw = params.value_min + f32(texel_value.r);
    let level = window_level(raw);

    if params.use_palette != 0u {
        let color = textureLoad(palette_texture, vec2<i32>(i32(level), 0), 0);
        return vec4<f32>(color.rgb, 1.0);
    }

    let gray = f32(level) / 255.0;
    return vec4<f32>(gray, gray, gray, 1.0);
}
"#;

pub fn get_shader() -> &'static str {
    DISPLAY_SHADER
}
