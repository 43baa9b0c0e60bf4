use crate::object::{CompositionObject, Geometry, ObjectKind, Shape, SpriteShape, Visual};
use glam::{Affine2, Mat4, Vec2, Vec3};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Animatable property names.
pub mod names {
    pub const CENTER: &str = "Center";
    pub const CENTER_POINT: &str = "CenterPoint";
    pub const CLIP: &str = "Clip";
    pub const COLOR: &str = "Color";
    pub const CORNER_RADIUS: &str = "CornerRadius";
    pub const ELLIPSE_CENTER: &str = "EllipseCenter";
    pub const ELLIPSE_RADIUS: &str = "EllipseRadius";
    pub const END_POINT: &str = "EndPoint";
    pub const IS_VISIBLE: &str = "IsVisible";
    pub const OFFSET: &str = "Offset";
    pub const OPACITY: &str = "Opacity";
    pub const PATH: &str = "Path";
    pub const PROGRESS: &str = "Progress";
    pub const RADIUS: &str = "Radius";
    pub const ROTATION_ANGLE_IN_DEGREES: &str = "RotationAngleInDegrees";
    pub const ROTATION_AXIS: &str = "RotationAxis";
    pub const SCALE: &str = "Scale";
    pub const SIZE: &str = "Size";
    pub const START_POINT: &str = "StartPoint";
    pub const STROKE_END_CAP: &str = "StrokeEndCap";
    pub const STROKE_LINE_JOIN: &str = "StrokeLineJoin";
    pub const STROKE_MITER_LIMIT: &str = "StrokeMiterLimit";
    pub const STROKE_START_CAP: &str = "StrokeStartCap";
    pub const STROKE_THICKNESS: &str = "StrokeThickness";
    pub const TRANSFORM_MATRIX: &str = "TransformMatrix";
    pub const TRIM_END: &str = "TrimEnd";
    pub const TRIM_OFFSET: &str = "TrimOffset";
    pub const TRIM_START: &str = "TrimStart";
}

/// Set of properties of an object, one bit per property.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyId(u32);

impl PropertyId {
    pub const NONE: PropertyId = PropertyId(0);
    pub const BORDER_MODE: PropertyId = PropertyId(1);
    pub const CENTER_POINT: PropertyId = PropertyId(1 << 1);
    pub const CHILDREN: PropertyId = PropertyId(1 << 2);
    pub const CLIP: PropertyId = PropertyId(1 << 3);
    pub const COLOR: PropertyId = PropertyId(1 << 4);
    pub const COMMENT: PropertyId = PropertyId(1 << 5);
    pub const IS_VISIBLE: PropertyId = PropertyId(1 << 6);
    pub const OFFSET: PropertyId = PropertyId(1 << 7);
    pub const OPACITY: PropertyId = PropertyId(1 << 8);
    pub const PATH: PropertyId = PropertyId(1 << 9);
    pub const POSITION: PropertyId = PropertyId(1 << 10);
    pub const PROGRESS: PropertyId = PropertyId(1 << 11);
    pub const PROPERTIES: PropertyId = PropertyId(1 << 12);
    pub const ROTATION_ANGLE_IN_DEGREES: PropertyId = PropertyId(1 << 13);
    pub const ROTATION_AXIS: PropertyId = PropertyId(1 << 14);
    pub const SCALE: PropertyId = PropertyId(1 << 15);
    pub const SIZE: PropertyId = PropertyId(1 << 16);
    pub const STROKE_END_CAP: PropertyId = PropertyId(1 << 17);
    pub const STROKE_DASH_CAP: PropertyId = PropertyId(1 << 18);
    pub const STROKE_LINE_JOIN: PropertyId = PropertyId(1 << 19);
    pub const STROKE_MITER_LIMIT: PropertyId = PropertyId(1 << 20);
    pub const STROKE_START_CAP: PropertyId = PropertyId(1 << 21);
    pub const TRANSFORM_MATRIX: PropertyId = PropertyId(1 << 22);
    pub const TRIM_END: PropertyId = PropertyId(1 << 23);
    pub const TRIM_OFFSET: PropertyId = PropertyId(1 << 24);
    pub const TRIM_START: PropertyId = PropertyId(1 << 25);

    const NAMED: [(&'static str, PropertyId); 26] = [
        ("BorderMode", Self::BORDER_MODE),
        ("CenterPoint", Self::CENTER_POINT),
        ("Children", Self::CHILDREN),
        ("Clip", Self::CLIP),
        ("Color", Self::COLOR),
        ("Comment", Self::COMMENT),
        ("IsVisible", Self::IS_VISIBLE),
        ("Offset", Self::OFFSET),
        ("Opacity", Self::OPACITY),
        ("Path", Self::PATH),
        ("Position", Self::POSITION),
        ("Progress", Self::PROGRESS),
        ("Properties", Self::PROPERTIES),
        ("RotationAngleInDegrees", Self::ROTATION_ANGLE_IN_DEGREES),
        ("RotationAxis", Self::ROTATION_AXIS),
        ("Scale", Self::SCALE),
        ("Size", Self::SIZE),
        ("StrokeEndCap", Self::STROKE_END_CAP),
        ("StrokeDashCap", Self::STROKE_DASH_CAP),
        ("StrokeLineJoin", Self::STROKE_LINE_JOIN),
        ("StrokeMiterLimit", Self::STROKE_MITER_LIMIT),
        ("StrokeStartCap", Self::STROKE_START_CAP),
        ("TransformMatrix", Self::TRANSFORM_MATRIX),
        ("TrimEnd", Self::TRIM_END),
        ("TrimOffset", Self::TRIM_OFFSET),
        ("TrimStart", Self::TRIM_START),
    ];

    /// The property an animator targets. Sub-channels such as `Offset.X`
    /// count as the whole property; unknown names map to [`NONE`](Self::NONE).
    pub fn from_name(name: &str) -> PropertyId {
        let name = name.split('.').next().unwrap_or(name);
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(Self::NONE, |(_, id)| *id)
    }

    pub const fn union(self, other: PropertyId) -> PropertyId {
        PropertyId(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: PropertyId) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: PropertyId) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for PropertyId {
    type Output = PropertyId;
    fn bitor(self, rhs: PropertyId) -> PropertyId {
        PropertyId(self.0 | rhs.0)
    }
}

impl BitOrAssign for PropertyId {
    fn bitor_assign(&mut self, rhs: PropertyId) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PropertyId {
    type Output = PropertyId;
    fn bitand(self, rhs: PropertyId) -> PropertyId {
        PropertyId(self.0 & rhs.0)
    }
}

impl Not for PropertyId {
    type Output = PropertyId;
    fn not(self) -> PropertyId {
        PropertyId(!self.0)
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(_, id)| self.contains(*id))
            .map(|(n, _)| *n)
            .collect();
        f.write_str(&names.join(" | "))
    }
}

fn set_if<T>(value: &Option<T>, id: PropertyId) -> PropertyId {
    if value.is_some() {
        id
    } else {
        PropertyId::NONE
    }
}

/// Animated properties, plus the comment and property-set entries that every
/// object can carry.
pub fn non_default_object_properties(obj: &CompositionObject) -> PropertyId {
    let mut result = set_if(&obj.meta.comment, PropertyId::COMMENT);
    if !obj.properties.is_empty() {
        result |= PropertyId::PROPERTIES;
    }
    for animator in &obj.animators {
        result |= PropertyId::from_name(&animator.property);
    }
    result
}

/// Non-default properties of a visual, not counting its children.
pub fn non_default_visual_properties(obj: &CompositionObject) -> PropertyId {
    let own = obj.visual().map_or(PropertyId::NONE, visual_fields);
    own | non_default_object_properties(obj)
}

pub fn non_default_container_visual_properties(obj: &CompositionObject) -> PropertyId {
    let children = match obj.visual() {
        Some(v) if !v.children.is_empty() => PropertyId::CHILDREN,
        _ => PropertyId::NONE,
    };
    children | non_default_visual_properties(obj)
}

fn visual_fields(v: &Visual) -> PropertyId {
    set_if(&v.center_point, PropertyId::CENTER_POINT)
        | set_if(&v.clip, PropertyId::CLIP)
        | set_if(&v.is_visible, PropertyId::IS_VISIBLE)
        | set_if(&v.offset, PropertyId::OFFSET)
        | set_if(&v.opacity, PropertyId::OPACITY)
        | set_if(&v.rotation_angle_in_degrees, PropertyId::ROTATION_ANGLE_IN_DEGREES)
        | set_if(&v.rotation_axis, PropertyId::ROTATION_AXIS)
        | set_if(&v.scale, PropertyId::SCALE)
        | set_if(&v.size, PropertyId::SIZE)
        | set_if(&v.transform_matrix, PropertyId::TRANSFORM_MATRIX)
}

pub fn non_default_shape_properties(obj: &CompositionObject) -> PropertyId {
    let own = obj.shape().map_or(PropertyId::NONE, shape_fields);
    own | non_default_object_properties(obj)
}

fn shape_fields(s: &Shape) -> PropertyId {
    set_if(&s.center_point, PropertyId::CENTER_POINT)
        | set_if(&s.offset, PropertyId::OFFSET)
        | set_if(&s.rotation_angle_in_degrees, PropertyId::ROTATION_ANGLE_IN_DEGREES)
        | set_if(&s.scale, PropertyId::SCALE)
        | set_if(&s.transform_matrix, PropertyId::TRANSFORM_MATRIX)
}

pub fn non_default_sprite_shape_properties(obj: &CompositionObject, sprite: &SpriteShape) -> PropertyId {
    set_if(&sprite.stroke_dash_cap, PropertyId::STROKE_DASH_CAP)
        | set_if(&sprite.stroke_end_cap, PropertyId::STROKE_END_CAP)
        | set_if(&sprite.stroke_line_join, PropertyId::STROKE_LINE_JOIN)
        | set_if(&sprite.stroke_miter_limit, PropertyId::STROKE_MITER_LIMIT)
        | set_if(&sprite.stroke_start_cap, PropertyId::STROKE_START_CAP)
        | non_default_shape_properties(obj)
}

pub fn non_default_geometry_properties(obj: &CompositionObject, geometry: &Geometry) -> PropertyId {
    set_if(&geometry.trim_start, PropertyId::TRIM_START)
        | set_if(&geometry.trim_end, PropertyId::TRIM_END)
        | set_if(&geometry.trim_offset, PropertyId::TRIM_OFFSET)
        | non_default_object_properties(obj)
}

/// The shared trim properties of any geometry kind.
pub fn geometry_of(kind: &ObjectKind) -> Option<&Geometry> {
    match kind {
        ObjectKind::EllipseGeometry(g) => Some(&g.geometry),
        ObjectKind::RectangleGeometry(g) => Some(&g.geometry),
        ObjectKind::RoundedRectangleGeometry(g) => Some(&g.geometry),
        ObjectKind::PathGeometry(g) => Some(&g.geometry),
        _ => None,
    }
}

pub fn geometry_of_mut(kind: &mut ObjectKind) -> Option<&mut Geometry> {
    match kind {
        ObjectKind::EllipseGeometry(g) => Some(&mut g.geometry),
        ObjectKind::RectangleGeometry(g) => Some(&mut g.geometry),
        ObjectKind::RoundedRectangleGeometry(g) => Some(&mut g.geometry),
        ObjectKind::PathGeometry(g) => Some(&mut g.geometry),
        _ => None,
    }
}

/// Whether the properties of a parent and its only child can be moved onto
/// one object without changing the result. Transforms evaluate in the order
/// matrix, offset, rotation, scale.
pub fn are_properties_orthogonal(parent: PropertyId, child: PropertyId) -> bool {
    if parent.intersects(child) {
        return false;
    }

    let order_independent = PropertyId::COLOR | PropertyId::OPACITY | PropertyId::PATH;
    if order_independent.contains(parent) || order_independent.contains(child) {
        return true;
    }

    if child.intersects(PropertyId::TRANSFORM_MATRIX)
        && parent.intersects(
            PropertyId::OFFSET
                | PropertyId::ROTATION_ANGLE_IN_DEGREES
                | PropertyId::SCALE
                | PropertyId::CLIP
                | PropertyId::CENTER_POINT,
        )
    {
        return false;
    }

    if child.intersects(PropertyId::CENTER_POINT)
        && parent.intersects(
            PropertyId::TRANSFORM_MATRIX
                | PropertyId::OFFSET
                | PropertyId::ROTATION_ANGLE_IN_DEGREES
                | PropertyId::SCALE,
        )
    {
        return false;
    }

    if parent.intersects(PropertyId::ROTATION_ANGLE_IN_DEGREES)
        && child.intersects(PropertyId::OFFSET | PropertyId::CLIP)
    {
        return false;
    }

    if parent.intersects(PropertyId::SCALE)
        && child.intersects(PropertyId::OFFSET | PropertyId::ROTATION_ANGLE_IN_DEGREES | PropertyId::CLIP)
    {
        return false;
    }

    true
}

/// 2-D transform of shape properties: scale, then rotation, both about
/// `center_point`, then the offset, then `matrix`.
pub fn shape_transform(
    center_point: Vec2,
    scale: Vec2,
    rotation_degrees: f32,
    offset: Vec2,
    matrix: Affine2,
) -> Affine2 {
    let to_center = Affine2::from_translation(center_point);
    let from_center = Affine2::from_translation(-center_point);
    matrix
        * Affine2::from_translation(offset)
        * to_center
        * Affine2::from_angle(rotation_degrees.to_radians())
        * Affine2::from_scale(scale)
        * from_center
}

/// 3-D counterpart of [`shape_transform`] for visuals.
pub fn visual_transform(
    center_point: Vec3,
    scale: Vec3,
    rotation_degrees: f32,
    rotation_axis: Vec3,
    offset: Vec3,
    matrix: Mat4,
) -> Mat4 {
    let rotation = if rotation_axis == Vec3::Z {
        Mat4::from_rotation_z(rotation_degrees.to_radians())
    } else {
        Mat4::from_axis_angle(rotation_axis.normalize_or_zero(), rotation_degrees.to_radians())
    };
    matrix
        * Mat4::from_translation(offset)
        * Mat4::from_translation(center_point)
        * rotation
        * Mat4::from_scale(scale)
        * Mat4::from_translation(-center_point)
}

/// Embeds a 2-D affine transform in the xy-plane of a 4x4 matrix.
pub fn affine_to_mat4(m: Affine2) -> Mat4 {
    let x = m.matrix2.x_axis;
    let y = m.matrix2.y_axis;
    let t = m.translation;
    Mat4::from_cols(
        glam::Vec4::new(x.x, x.y, 0.0, 0.0),
        glam::Vec4::new(y.x, y.y, 0.0, 0.0),
        glam::Vec4::Z,
        glam::Vec4::new(t.x, t.y, 0.0, 1.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectId, ContainerShape};

    #[test]
    fn animator_sub_channels_count_as_the_property() {
        assert_eq!(PropertyId::from_name("Offset.X"), PropertyId::OFFSET);
        assert_eq!(PropertyId::from_name("Opacity"), PropertyId::OPACITY);
        assert_eq!(PropertyId::from_name("Frobnicate"), PropertyId::NONE);
    }

    #[test]
    fn shape_properties_include_animators_and_comments() {
        let mut obj = CompositionObject::new(ObjectKind::ContainerShape(ContainerShape {
            shape: Shape {
                offset: Some(Vec2::ONE),
                ..Default::default()
            },
            shapes: vec![],
        }))
        .with_comment("layer 3");
        obj.start_animation("Scale", ObjectId(9), None);

        let props = non_default_shape_properties(&obj);
        assert_eq!(
            props,
            PropertyId::OFFSET | PropertyId::SCALE | PropertyId::COMMENT
        );
        assert_eq!(format!("{props:?}"), "Comment | Offset | Scale");
    }

    #[test]
    fn matrix_cannot_move_across_offset() {
        let offset = PropertyId::OFFSET;
        let matrix = PropertyId::TRANSFORM_MATRIX;
        assert!(!are_properties_orthogonal(offset, matrix));
        assert!(are_properties_orthogonal(matrix, offset));
        assert!(!are_properties_orthogonal(PropertyId::SCALE, PropertyId::ROTATION_ANGLE_IN_DEGREES));
        assert!(are_properties_orthogonal(PropertyId::OPACITY, matrix));
        assert!(!are_properties_orthogonal(offset, offset));
    }

    #[test]
    fn shape_transform_scales_before_translating() {
        let m = shape_transform(Vec2::ZERO, Vec2::splat(2.0), 0.0, Vec2::new(10.0, 0.0), Affine2::IDENTITY);
        assert_eq!(m.transform_point2(Vec2::new(1.0, 1.0)), Vec2::new(12.0, 2.0));

        let about_center = shape_transform(Vec2::new(1.0, 1.0), Vec2::splat(2.0), 0.0, Vec2::ZERO, Affine2::IDENTITY);
        assert_eq!(about_center.transform_point2(Vec2::new(1.0, 1.0)), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn affine_embedding_matches_2d_transform() {
        let m = shape_transform(Vec2::ZERO, Vec2::new(2.0, 3.0), 90.0, Vec2::new(5.0, 6.0), Affine2::IDENTITY);
        let p = Vec2::new(1.0, 2.0);
        let expected = m.transform_point2(p);
        let got = affine_to_mat4(m).transform_point3(p.extend(0.0));
        assert!((got.truncate() - expected).length() < 1e-5);
    }
}
