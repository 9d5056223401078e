&[
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_vertex_array_object/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_lose_context/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_fbo_render_mipmap/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_texture_float_linear/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_texture_filter_anisotropic/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_texture_half_float_linear/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_debug_renderer_info/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_texture_compression_bptc/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_compressed_texture_etc/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_texture_float/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_frag_depth/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_element_index_uint/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_multiview/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_compressed_texture_s3tc_srgb/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_debug_shaders/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_disjoint_timer_query/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/ANGLE_instanced_arrays/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_sRGB/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_shader_texture_lod/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_color_buffer_half_float/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_disjoint_timer_query_webgl2/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_compressed_texture_s3tc/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_compressed_texture_etc1/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_texture_half_float/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_texture_compression_rgtc/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/OES_standard_derivatives/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_compressed_texture_astc/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/KHR_parallel_shader_compile/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_color_buffer_float/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_draw_buffers/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_depth_texture/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_security_sensitive_resources/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_float_blend/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_blend_minmax/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/EXT_color_buffer_float/extension.xml"),
&*include_bytes!("/root/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/khronos_api-3.1.0/api_webgl/extensions/WEBGL_compressed_texture_pvrtc/extension.xml"),
]
