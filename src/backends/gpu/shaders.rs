//! WGSL compute shaders for the per-pixel programs
//!
//! Each shader processes one pixel (four packed lanes) per invocation. The
//! `Params` struct mirrors `RawUniforms` field for field. Buffers are flat
//! `array<f32>` in element order; `fetch` clamps out-of-range reads to zero
//! the way the CPU rasterizer does.

/// Shared preamble: uniform block, buffer bindings, and the guarded fetch.
/// Binding 1 is the first input, binding 2 the second, binding 3 the third
/// (unused slots are bound to a one-element dummy), binding 4 the output.
const PREAMBLE: &str = r#"
struct Params {
    width: u32,
    height: u32,
    max_index: i32,
    incx: i32,
    incy: i32,
    alpha: f32,
    beta: f32,
    m: i32,
    n: i32,
    k: i32,
    lda: i32,
    ldb: i32,
    ldc: i32,
    trans_a: u32,
    trans_b: u32,
    pad0: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> in0: array<f32>;
@group(0) @binding(2) var<storage, read> in1: array<f32>;
@group(0) @binding(3) var<storage, read> in2: array<f32>;
@group(0) @binding(4) var<storage, read_write> out: array<f32>;

fn fetch0(i: i32) -> f32 {
    if (i < 0 || u32(i) >= arrayLength(&in0)) { return 0.0; }
    return in0[i];
}

fn fetch1(i: i32) -> f32 {
    if (i < 0 || u32(i) >= arrayLength(&in1)) { return 0.0; }
    return in1[i];
}

fn fetch2(i: i32) -> f32 {
    if (i < 0 || u32(i) >= arrayLength(&in2)) { return 0.0; }
    return in2[i];
}
"#;

const SSCAL_BODY: &str = r#"
@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) { return; }
    let p = i32(gid.y * params.width + gid.x);
    let index = i32(gid.y * params.width + gid.x * 4u);
    for (var c = 0; c < 4; c++) {
        let i = index + c;
        let v = fetch0(p * 4 + c);
        if (i > params.max_index || i % params.incx != 0) {
            out[p * 4 + c] = v;
        } else {
            out[p * 4 + c] = params.alpha * v;
        }
    }
}
"#;

/// Strided map shared by copy, axpy, and the dot pre-multiply; the operation
/// applied at gated lanes is substituted per program.
const STRIDED_TEMPLATE: &str = r#"
@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) { return; }
    let p = i32(gid.y * params.width + gid.x);
    let index = i32(gid.y * params.width + gid.x * 4u);
    for (var c = 0; c < 4; c++) {
        let i = index + c;
        var v = fetch1(p * 4 + c);
        if (i < params.max_index && i % params.incy == 0) {
            let xi = i + (i / params.incy) * (params.incx - params.incy);
            //OP
        }
        out[p * 4 + c] = v;
    }
}
"#;

/// Halving-reduction step; the transform applied to fetched values is
/// substituted per program (identity for the dot sum, abs for sasum).
const REDUCE_TEMPLATE: &str = r#"
@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) { return; }
    let p = i32(gid.y * params.width + gid.x);

    if (params.max_index == 1) {
        if (p == 0) {
            out[0] = XF(fetch0(0)) + XF(fetch0(1)) + XF(fetch0(2)) + XF(fetch0(3));
            out[1] = 0.0;
            out[2] = 0.0;
            out[3] = 0.0;
        } else {
            for (var c = 0; c < 4; c++) { out[p * 4 + c] = 0.0; }
        }
        return;
    }

    let halfway = params.max_index / 4;
    if (p > halfway) {
        for (var c = 0; c < 4; c++) { out[p * 4 + c] = 0.0; }
        return;
    }
    let sp = (p + halfway) / params.incx;
    for (var c = 0; c < 4; c++) {
        let i = p + c;
        let own = XF(fetch0(p * 4 + c));
        if (i > params.max_index || i % params.incx != 0) {
            out[p * 4 + c] = own;
        } else {
            out[p * 4 + c] = XF(fetch0(sp * 4 + c)) + own;
        }
    }
}
"#;

const SGEMM_BODY: &str = r#"
@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) { return; }
    let p = i32(gid.y * params.width + gid.x);
    let index = i32(gid.y * params.width + gid.x * 4u);
    for (var c = 0; c < 4; c++) {
        let o = index + c;
        var v = 0.0;
        if (params.beta != 0.0) {
            v = fetch2(p * 4 + c);
        }
        if (o < params.max_index) {
            let i = o % params.m;
            let j = o / params.m;
            var acc = 0.0;
            for (var l = 0; l < params.k; l++) {
                var av: f32;
                if (params.trans_a != 0u) {
                    av = fetch0(params.lda * i + l);
                } else {
                    av = fetch0(params.lda * l + i);
                }
                var bv: f32;
                if (params.trans_b != 0u) {
                    bv = fetch1(params.ldb * l + j);
                } else {
                    bv = fetch1(params.ldb * j + l);
                }
                acc += av * bv;
            }
            v = params.alpha * acc + v * params.beta;
        }
        out[p * 4 + c] = v;
    }
}
"#;

const SGEMM4X4_BODY: &str = r#"
@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) { return; }
    let p = i32(gid.y * params.width + gid.x);
    let index = i32(gid.y * params.width + gid.x * 4u);
    for (var c = 0; c < 4; c++) {
        let o = index + c;
        var v = 0.0;
        if (params.beta != 0.0) {
            v = fetch2(p * 4 + c);
        }
        if (o < params.max_index) {
            let i = o % params.m;
            let j = o / params.m;
            var acc = 0.0;
            for (var l = 0; l < params.k; l += 4) {
                let ai = params.lda * i + l;
                let bi = params.ldb * j + l;
                for (var c2 = 0; c2 < 4; c2++) {
                    acc += fetch0(ai + c2) * fetch1(bi + c2);
                }
            }
            v = params.alpha * acc + v * params.beta;
        }
        out[p * 4 + c] = v;
    }
}
"#;

const SGEMM4X4_REORDER_BODY: &str = r#"
@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= params.width || gid.y >= params.height) { return; }
    let p = i32(gid.y * params.width + gid.x);
    let index = i32(gid.y * params.width + gid.x * 4u);
    let frag = index / 4;
    for (var c = 0; c < 4; c++) {
        var v = 0.0;
        if (index + c < params.max_index) {
            let o = frag * 4 + c;
            v = fetch0(params.m * (o % params.m) + o / params.m);
        }
        out[p * 4 + c] = v;
    }
}
"#;

/// Assemble the WGSL source for one program.
pub fn source(program: crate::surface::Program) -> String {
    use crate::surface::Program;
    let body = match program {
        Program::Sscal => SSCAL_BODY.to_string(),
        Program::Scopy => STRIDED_TEMPLATE.replace("//OP", "v = fetch0(xi);"),
        Program::Saxpy => STRIDED_TEMPLATE.replace("//OP", "v += params.alpha * fetch0(xi);"),
        Program::SdotMul => STRIDED_TEMPLATE.replace("//OP", "v *= fetch0(xi);"),
        Program::SdotSum => REDUCE_TEMPLATE.replace("XF", "identity"),
        Program::Sasum => REDUCE_TEMPLATE.replace("XF", "abs"),
        Program::Sgemm => SGEMM_BODY.to_string(),
        Program::Sgemm4x4 => SGEMM4X4_BODY.to_string(),
        Program::Sgemm4x4Reorder => SGEMM4X4_REORDER_BODY.to_string(),
    };
    let helper = match program {
        Program::SdotSum => "fn identity(v: f32) -> f32 { return v; }\n",
        _ => "",
    };
    format!("{PREAMBLE}{helper}{body}")
}
