// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library source files referenced by file based implementations.
//!
//! Paths are relative to the library root, exactly as they appear in
//! [`crate::element::Implementation::file`] and in `#include` lines.

/// All embedded library sources as `(path, text)` pairs
pub fn library_sources() -> &'static [(&'static str, &'static str)] {
    SOURCES
}

/// Look up one embedded library source
pub fn library_source(path: &str) -> Option<&'static str> {
    SOURCES.iter().find(|(p, _)| *p == path).map(|(_, text)| *text)
}

const SOURCES: &[(&str, &str)] = &[
    ("stdlib/genglsl/mx_image_float.glsl", GLSL_IMAGE_FLOAT),
    ("stdlib/genglsl/mx_image_color3.glsl", GLSL_IMAGE_COLOR3),
    ("pbrlib/genglsl/mx_diffuse_bsdf.glsl", GLSL_DIFFUSE_BSDF),
    ("pbrlib/genglsl/mx_dielectric_bsdf.glsl", GLSL_DIELECTRIC_BSDF),
    ("pbrlib/genglsl/mx_uniform_edf.glsl", GLSL_UNIFORM_EDF),
    ("pbrlib/genglsl/mx_anisotropic_vdf.glsl", GLSL_ANISOTROPIC_VDF),
    ("pbrlib/genglsl/lib/mx_microfacet.glsl", GLSL_MICROFACET),
    ("pbrlib/genglsl/lib/mx_environment_fis.glsl", GLSL_ENVIRONMENT_FIS),
    ("pbrlib/genglsl/lib/mx_environment_prefilter.glsl", GLSL_ENVIRONMENT_PREFILTER),
    ("pbrlib/genglsl/lib/mx_environment_none.glsl", GLSL_ENVIRONMENT_NONE),
    ("pbrlib/genglsl/lib/mx_shadow.glsl", GLSL_SHADOW),
    ("lights/genglsl/mx_point_light.glsl", GLSL_POINT_LIGHT),
    ("lights/genglsl/mx_directional_light.glsl", GLSL_DIRECTIONAL_LIGHT),
    ("stdlib/genosl/mx_image_float.osl", OSL_IMAGE_FLOAT),
    ("stdlib/genosl/mx_image_color3.osl", OSL_IMAGE_COLOR3),
    ("pbrlib/genosl/mx_dielectric_bsdf.osl", OSL_DIELECTRIC_BSDF),
];

const GLSL_IMAGE_FLOAT: &str = r"void mx_image_float(sampler2D tex_sampler, float defaultval, vec2 texcoord, int uaddressmode, int vaddressmode, int filtertype, out float result)
{
    if ((uaddressmode == 0 && (texcoord.x < 0.0 || texcoord.x > 1.0)) ||
        (vaddressmode == 0 && (texcoord.y < 0.0 || texcoord.y > 1.0)))
    {
        result = defaultval;
        return;
    }
    result = texture(tex_sampler, mx_transform_uv(texcoord)).r;
}
";

const GLSL_IMAGE_COLOR3: &str = r"void mx_image_color3(sampler2D tex_sampler, vec3 defaultval, vec2 texcoord, int uaddressmode, int vaddressmode, int filtertype, out vec3 result)
{
    if ((uaddressmode == 0 && (texcoord.x < 0.0 || texcoord.x > 1.0)) ||
        (vaddressmode == 0 && (texcoord.y < 0.0 || texcoord.y > 1.0)))
    {
        result = defaultval;
        return;
    }
    result = texture(tex_sampler, mx_transform_uv(texcoord)).rgb;
}
";

const GLSL_MICROFACET: &str = r"#define M_PI 3.1415926535897932
#define M_PI_INV (1.0 / M_PI)

float mx_fresnel_dielectric(float cosTheta, float ior)
{
    float c = cosTheta;
    float g2 = ior * ior + c * c - 1.0;
    if (g2 < 0.0)
    {
        return 1.0;
    }
    float g = sqrt(g2);
    float a = (g - c) / (g + c);
    float b = (c * (g + c) - 1.0) / (c * (g - c) + 1.0);
    return 0.5 * a * a * (1.0 + b * b);
}

float mx_ggx_NDF(vec3 H, vec3 N, vec2 alpha)
{
    float NdotH = max(dot(N, H), 0.0);
    float a2 = alpha.x * alpha.y;
    float d = NdotH * NdotH * (a2 - 1.0) + 1.0;
    return a2 / (M_PI * d * d);
}

float mx_directional_albedo(float NdotV, float ior)
{
#if DIRECTIONAL_ALBEDO_METHOD == 1
    return texture(u_albedoTable, vec2(NdotV, ior / 3.0)).r;
#else
    return mx_fresnel_dielectric(NdotV, ior);
#endif
}
";

const GLSL_DIFFUSE_BSDF: &str = r#"#include "pbrlib/genglsl/lib/mx_microfacet.glsl"

void mx_diffuse_bsdf_reflection(vec3 L, vec3 V, vec3 P, float occlusion, float weight, vec3 color, float roughness, vec3 normal, out BSDF result)
{
    float NdotL = clamp(dot(normal, L), 0.0, 1.0);
    result = color * weight * NdotL * M_PI_INV * occlusion;
}

void mx_diffuse_bsdf_indirect(vec3 V, float weight, vec3 color, float roughness, vec3 normal, out BSDF result)
{
    result = mx_environment_irradiance(normal) * color * weight;
}
"#;

const GLSL_DIELECTRIC_BSDF: &str = r#"#include "pbrlib/genglsl/lib/mx_microfacet.glsl"

void mx_dielectric_bsdf_reflection(vec3 L, vec3 V, vec3 P, float occlusion, float weight, vec3 tint, float ior, vec2 roughness, vec3 N, int distribution, int scatter_mode, BSDF base, out BSDF result)
{
    if (weight < M_FLOAT_EPS || scatter_mode == 1)
    {
        result = base;
        return;
    }
    vec3 H = normalize(L + V);
    float F = mx_fresnel_dielectric(max(dot(V, H), 0.0), ior);
    float D = mx_ggx_NDF(H, N, roughness);
    float NdotL = clamp(dot(N, L), 0.0, 1.0);
    float albedo = mx_directional_albedo(clamp(dot(N, V), 0.0, 1.0), ior);
    result = tint * weight * F * D * NdotL * occlusion + base * (1.0 - albedo * weight);
}

void mx_dielectric_bsdf_transmission(vec3 V, float weight, vec3 tint, float ior, vec2 roughness, vec3 N, int distribution, int scatter_mode, BSDF base, out BSDF result)
{
    if (weight < M_FLOAT_EPS || scatter_mode == 0)
    {
        result = base;
        return;
    }
    float F = mx_fresnel_dielectric(clamp(dot(N, V), 0.0, 1.0), ior);
    result = tint * weight * (1.0 - F);
}

void mx_dielectric_bsdf_indirect(vec3 V, float weight, vec3 tint, float ior, vec2 roughness, vec3 N, int distribution, int scatter_mode, BSDF base, out BSDF result)
{
    if (weight < M_FLOAT_EPS || scatter_mode == 1)
    {
        result = base;
        return;
    }
    float F = mx_fresnel_dielectric(clamp(dot(N, V), 0.0, 1.0), ior);
    result = mx_environment_radiance(N, V, roughness) * tint * weight * F + base * (1.0 - F * weight);
}
"#;

const GLSL_UNIFORM_EDF: &str = r"void mx_uniform_edf(vec3 N, vec3 V, vec3 color, out EDF result)
{
    result = color;
}
";

const GLSL_ANISOTROPIC_VDF: &str = r"void mx_anisotropic_vdf(vec3 absorption, vec3 scattering, float anisotropy, out VDF result)
{
    result.absorption = absorption;
    result.scattering = scattering;
}
";

const GLSL_ENVIRONMENT_FIS: &str = r"vec3 mx_environment_irradiance(vec3 N)
{
    vec3 dir = (u_envMatrix * vec4(N, 0.0)).xyz;
    return texture(u_envIrradiance, vec2(atan(dir.x, -dir.z) * 0.5 * M_PI_INV + 0.5, acos(dir.y) * M_PI_INV)).rgb;
}

vec3 mx_environment_radiance(vec3 N, vec3 V, vec2 roughness)
{
    vec3 R = reflect(-V, N);
    vec3 radiance = vec3(0.0);
    for (int i = 0; i < u_envRadianceSamples; i++)
    {
        vec3 dir = (u_envMatrix * vec4(R, 0.0)).xyz;
        float lod = roughness.x * float(u_envRadianceMips);
        radiance += textureLod(u_envRadiance, vec2(atan(dir.x, -dir.z) * 0.5 * M_PI_INV + 0.5, acos(dir.y) * M_PI_INV), lod).rgb;
    }
    return radiance / float(max(u_envRadianceSamples, 1));
}
";

const GLSL_ENVIRONMENT_PREFILTER: &str = r"vec3 mx_environment_irradiance(vec3 N)
{
    vec3 dir = (u_envMatrix * vec4(N, 0.0)).xyz;
    return texture(u_envIrradiance, vec2(atan(dir.x, -dir.z) * 0.5 * M_PI_INV + 0.5, acos(dir.y) * M_PI_INV)).rgb;
}

vec3 mx_environment_radiance(vec3 N, vec3 V, vec2 roughness)
{
    vec3 dir = (u_envMatrix * vec4(reflect(-V, N), 0.0)).xyz;
    float lod = sqrt(roughness.x * roughness.y) * float(u_envRadianceMips - 1);
    return textureLod(u_envRadiance, vec2(atan(dir.x, -dir.z) * 0.5 * M_PI_INV + 0.5, acos(dir.y) * M_PI_INV), lod).rgb;
}
";

const GLSL_ENVIRONMENT_NONE: &str = r"vec3 mx_environment_irradiance(vec3 N)
{
    return vec3(0.0);
}

vec3 mx_environment_radiance(vec3 N, vec3 V, vec2 roughness)
{
    return vec3(0.0);
}
";

const GLSL_SHADOW: &str = r"float mx_variance_shadow_occlusion(vec2 moments, float fragmentDepth)
{
    const float MIN_VARIANCE = 0.00001;
    float p = (fragmentDepth <= moments.x) ? 1.0 : 0.0;
    float variance = max(moments.y - moments.x * moments.x, MIN_VARIANCE);
    float d = fragmentDepth - moments.x;
    float pMax = variance / (variance + d * d);
    return max(p, pMax);
}
";

const GLSL_POINT_LIGHT: &str = r"void mx_point_light(LightData light, vec3 position, out lightshader result)
{
    result.direction = light.position - position;
    float distance = length(result.direction) + M_FLOAT_EPS;
    float attenuation = pow(distance + 1.0, light.decay_rate + M_FLOAT_EPS);
    result.intensity = light.color * light.intensity / attenuation;
    result.direction /= distance;
}
";

const GLSL_DIRECTIONAL_LIGHT: &str = r"void mx_directional_light(LightData light, vec3 position, out lightshader result)
{
    result.direction = -light.direction;
    result.intensity = light.color * light.intensity;
}
";

const OSL_IMAGE_FLOAT: &str = r#"void mx_image_float(string file, float default_value, vector2 texcoord, string uaddressmode, string vaddressmode, string filtertype, output float result)
{
    vector2 st = mx_transform_uv(texcoord);
    result = texture(file, st.x, st.y, "missingcolor", color(default_value), "swrap", uaddressmode, "twrap", vaddressmode);
}
"#;

const OSL_IMAGE_COLOR3: &str = r#"void mx_image_color3(string file, color default_value, vector2 texcoord, string uaddressmode, string vaddressmode, string filtertype, output color result)
{
    vector2 st = mx_transform_uv(texcoord);
    result = texture(file, st.x, st.y, "missingcolor", default_value, "swrap", uaddressmode, "twrap", vaddressmode);
}
"#;

const OSL_DIELECTRIC_BSDF: &str = r#"void mx_dielectric_bsdf(float weight, color tint, float ior, vector2 roughness, normal N, string distribution, string scatter_mode, output closure color result)
{
    if (scatter_mode == "R")
    {
        result = weight * dielectric_bsdf(N, vector(0.0), tint, color(0.0), roughness.x, roughness.y, ior, distribution);
    }
    else if (scatter_mode == "T")
    {
        result = weight * dielectric_bsdf(N, vector(0.0), color(0.0), tint, roughness.x, roughness.y, ior, distribution);
    }
    else
    {
        result = weight * dielectric_bsdf(N, vector(0.0), tint, tint, roughness.x, roughness.y, ior, distribution);
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(library_source("pbrlib/genglsl/mx_diffuse_bsdf.glsl")
            .is_some_and(|text| text.contains("mx_diffuse_bsdf_reflection")));
        assert!(library_source("missing.glsl").is_none());
    }
}
