//! The two programs share a vertex shader and differ only in the sampler
//! type of the fragment shader.

pub mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        src: r"
            #version 450
            layout(location = 0) in vec3 position;
            layout(location = 1) in float tex_coord;

            layout(location = 0) out float v_tex_coord;

            void main() {
                gl_Position = vec4(position, 1.0);
                v_tex_coord = tex_coord;
            }
        ",
    }
}

pub mod fs_1d {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: r"
            #version 450
            layout(location = 0) in float v_tex_coord;
            layout(location = 0) out vec4 f_color;

            layout(set = 0, binding = 0) uniform sampler1D lookup;

            void main() {
                f_color = vec4(texture(lookup, v_tex_coord).rgb, 1.0);
            }
        ",
    }
}

pub mod fs_2d {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: r"
            #version 450
            layout(location = 0) in float v_tex_coord;
            layout(location = 0) out vec4 f_color;

            layout(set = 0, binding = 0) uniform sampler2D lookup;

            void main() {
                f_color = vec4(texture(lookup, vec2(v_tex_coord, 0.0)).rgb, 1.0);
            }
        ",
    }
}
