//! Unsets properties that hold their default value, and folds static
//! transform properties into a single matrix.

use crate::error::SceneResult;
use crate::object::{
    ColorSpace, CompositionObject, GradientBrush, GradientExtendMode, MappingMode, Metadata,
    ObjectId, ObjectKind, StepEasing, StrokeCap, StrokeLineJoin,
};
use crate::properties::{
    geometry_of, geometry_of_mut, non_default_geometry_properties, non_default_shape_properties,
    non_default_sprite_shape_properties, non_default_visual_properties, shape_transform,
    visual_transform, names, PropertyId,
};
use crate::scene::Scene;
use glam::{Affine2, Mat4, Vec2, Vec3};
use tracing::debug;

fn clear_default<T: PartialEq>(slot: &mut Option<T>, default: T) {
    if slot.as_ref() == Some(&default) {
        *slot = None;
    }
}

/// Runs over every object reachable from `root`. Returns how many objects
/// changed.
pub fn optimize_property_values(scene: &mut Scene, root: ObjectId) -> SceneResult<usize> {
    let mut changed = 0;
    for id in scene.reachable_from(root)? {
        let before = scene.get(id)?.clone();
        match &before.kind {
            ObjectKind::SpriteShape(sprite) => optimize_sprite_shape(scene, id, sprite.geometry)?,
            _ => optimize_object(scene.get_mut(id)?),
        }
        if *scene.get(id)? != before {
            changed += 1;
        }
    }
    debug!(changed, "optimized property values");
    Ok(changed)
}

fn optimize_object(object: &mut CompositionObject) {
    if object.visual().is_some() {
        return optimize_visual(object);
    }
    if matches!(object.kind, ObjectKind::ContainerShape(_)) {
        return optimize_shape(object);
    }
    match &mut object.kind {
        ObjectKind::StepEasing(easing) => optimize_step_easing(easing),
        ObjectKind::LinearGradientBrush(brush) => optimize_gradient(&mut brush.gradient),
        ObjectKind::RadialGradientBrush(brush) => optimize_gradient(&mut brush.gradient),
        kind => {
            if let Some(geometry) = geometry_of_mut(kind) {
                clear_default(&mut geometry.trim_end, 1.0);
                clear_default(&mut geometry.trim_offset, 0.0);
                clear_default(&mut geometry.trim_start, 0.0);
            }
        }
    }
}

fn optimize_step_easing(easing: &mut StepEasing) {
    clear_default(&mut easing.step_count, 1);
    clear_default(&mut easing.initial_step, 0);
    clear_default(&mut easing.final_step, 1);
    clear_default(&mut easing.is_initial_step_single_frame, false);
    clear_default(&mut easing.is_final_step_single_frame, false);
}

fn optimize_gradient(gradient: &mut GradientBrush) {
    clear_default(&mut gradient.anchor_point, Vec2::ZERO);
    clear_default(&mut gradient.center_point, Vec2::ZERO);
    clear_default(&mut gradient.extend_mode, GradientExtendMode::Clamp);
    clear_default(&mut gradient.interpolation_space, ColorSpace::Rgb);
    clear_default(&mut gradient.mapping_mode, MappingMode::Relative);
    clear_default(&mut gradient.offset, Vec2::ZERO);
    clear_default(&mut gradient.rotation_angle_in_degrees, 0.0);
    clear_default(&mut gradient.scale, Vec2::ONE);
    clear_default(&mut gradient.transform_matrix, Affine2::IDENTITY);
}

fn optimize_visual(object: &mut CompositionObject) {
    let Some(visual) = object.visual_mut() else {
        return;
    };
    clear_default(&mut visual.center_point, Vec3::ZERO);
    clear_default(&mut visual.is_visible, true);
    clear_default(&mut visual.offset, Vec3::ZERO);
    clear_default(&mut visual.opacity, 1.0);
    clear_default(&mut visual.rotation_angle_in_degrees, 0.0);
    clear_default(&mut visual.rotation_axis, Vec3::Z);
    clear_default(&mut visual.scale, Vec3::ONE);
    clear_default(&mut visual.size, Vec2::ZERO);
    clear_default(&mut visual.transform_matrix, Mat4::IDENTITY);

    let properties = non_default_visual_properties(object);
    let is_static = object.animators.is_empty();
    let Some(visual) = object.visual_mut() else {
        return;
    };

    if visual.center_point.is_some()
        && !properties.intersects(PropertyId::ROTATION_ANGLE_IN_DEGREES | PropertyId::SCALE)
    {
        visual.center_point = None;
        visual.rotation_axis = None;
    }

    let rotates_off_z = visual.rotation_angle_in_degrees.is_some_and(|r| r != 0.0)
        && visual.rotation_axis.is_some_and(|a| a != Vec3::Z);
    if !is_static || rotates_off_z {
        return;
    }

    let center_point = visual.center_point.take().unwrap_or(Vec3::ZERO);
    let scale = visual.scale.take().unwrap_or(Vec3::ONE);
    let rotation = visual.rotation_angle_in_degrees.take().unwrap_or(0.0);
    let offset = visual.offset.take().unwrap_or(Vec3::ZERO);
    let matrix = visual.transform_matrix.take().unwrap_or(Mat4::IDENTITY);
    visual.rotation_axis = None;

    let combined = visual_transform(center_point, scale, rotation, Vec3::Z, offset, matrix);
    if combined == Mat4::IDENTITY {
        return;
    }
    visual.transform_matrix = Some(combined);
    if combined != matrix {
        let mut parts = Vec::new();
        if scale != Vec3::ONE {
            parts.push(format!("Scale({},{},{})", scale.x, scale.y, scale.z));
        }
        if rotation != 0.0 {
            parts.push(format!("RotationDegrees({rotation})"));
        }
        if offset != Vec3::ZERO {
            parts.push(format!("Offset({},{},{})", offset.x, offset.y, offset.z));
        }
        append_description(&mut object.meta, &parts.join(", "));
    }
}

fn optimize_shape(object: &mut CompositionObject) {
    let properties = non_default_shape_properties(object);
    let is_static = object.animators.is_empty();
    let Some(shape) = object.shape_mut() else {
        return;
    };

    if shape.center_point.is_some()
        && !properties.intersects(PropertyId::ROTATION_ANGLE_IN_DEGREES | PropertyId::SCALE)
    {
        shape.center_point = None;
    }
    if !is_static {
        return;
    }

    let center_point = shape.center_point.take().unwrap_or(Vec2::ZERO);
    let scale = shape.scale.take().unwrap_or(Vec2::ONE);
    let rotation = shape.rotation_angle_in_degrees.take().unwrap_or(0.0);
    let offset = shape.offset.take().unwrap_or(Vec2::ZERO);
    let matrix = shape.transform_matrix.take().unwrap_or(Affine2::IDENTITY);

    let combined = shape_transform(center_point, scale, rotation, offset, matrix);
    if combined == Affine2::IDENTITY {
        return;
    }
    shape.transform_matrix = Some(combined);
    if combined != matrix {
        let mut parts = Vec::new();
        if scale != Vec2::ONE {
            parts.push(format!("Scale:{},{}", scale.x, scale.y));
        }
        if rotation != 0.0 {
            parts.push(format!("RotationDegrees:{rotation}"));
        }
        if offset != Vec2::ZERO {
            parts.push(format!("Offset:{},{}", offset.x, offset.y));
        }
        append_description(&mut object.meta, &parts.join(", "));
    }
}

fn append_description(meta: &mut Metadata, description: &str) {
    for slot in [&mut meta.short_description, &mut meta.long_description] {
        *slot = Some(match slot.take() {
            Some(existing) if !existing.is_empty() => format!("{existing} {description}"),
            _ => description.to_owned(),
        });
    }
}

fn optimize_sprite_shape(scene: &mut Scene, id: ObjectId, geometry: Option<ObjectId>) -> SceneResult<()> {
    let sprite_object = scene.get_mut(id)?;
    optimize_shape(sprite_object);
    if let ObjectKind::SpriteShape(sprite) = &mut sprite_object.kind {
        clear_default(&mut sprite.is_stroke_non_scaling, false);
        clear_default(&mut sprite.stroke_start_cap, StrokeCap::Flat);
        clear_default(&mut sprite.stroke_dash_cap, StrokeCap::Flat);
        clear_default(&mut sprite.stroke_end_cap, StrokeCap::Flat);
        clear_default(&mut sprite.stroke_dash_offset, 0.0);
        clear_default(&mut sprite.stroke_line_join, StrokeLineJoin::Miter);
        clear_default(&mut sprite.stroke_miter_limit, 1.0);
        clear_default(&mut sprite.stroke_thickness, 1.0);
    }

    let Some(geometry_id) = geometry else {
        return Ok(());
    };
    // The geometry's own defaults decide whether it counts as trimmed.
    optimize_object(scene.get_mut(geometry_id)?);
    let geometry_object = scene.get(geometry_id)?;
    let is_trimmed = geometry_of(&geometry_object.kind).is_some_and(|g| {
        non_default_geometry_properties(geometry_object, g)
            .intersects(PropertyId::TRIM_END | PropertyId::TRIM_START)
    });
    let is_ellipse = matches!(geometry_object.kind, ObjectKind::EllipseGeometry(_));
    let is_closed = is_ellipse
        || matches!(
            geometry_object.kind,
            ObjectKind::RectangleGeometry(_) | ObjectKind::RoundedRectangleGeometry(_)
        );

    let sprite_object = scene.get_mut(id)?;
    let ObjectKind::SpriteShape(sprite) = &sprite_object.kind else {
        return Ok(());
    };
    let properties = non_default_sprite_shape_properties(sprite_object, sprite);

    let mut dropped = Vec::new();
    if is_ellipse {
        dropped.push((PropertyId::STROKE_MITER_LIMIT, names::STROKE_MITER_LIMIT));
        dropped.push((PropertyId::STROKE_LINE_JOIN, names::STROKE_LINE_JOIN));
    }
    if is_closed && !is_trimmed {
        dropped.push((PropertyId::STROKE_START_CAP, names::STROKE_START_CAP));
        dropped.push((PropertyId::STROKE_END_CAP, names::STROKE_END_CAP));
    }
    for (property, name) in dropped {
        if !properties.intersects(property) {
            continue;
        }
        sprite_object.stop_animation(name);
        if let ObjectKind::SpriteShape(sprite) = &mut sprite_object.kind {
            match name {
                names::STROKE_MITER_LIMIT => sprite.stroke_miter_limit = None,
                names::STROKE_LINE_JOIN => sprite.stroke_line_join = None,
                names::STROKE_START_CAP => sprite.stroke_start_cap = None,
                _ => sprite.stroke_end_cap = None,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{
        ContainerShape, EllipseGeometry, Geometry, RectangleGeometry, Shape, ShapeVisual,
        SpriteShape, Visual,
    };

    fn single_shape_scene(shape: ObjectKind, extra: Vec<ObjectKind>) -> (Scene, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        for kind in extra {
            scene.add_kind(kind);
        }
        let shape = scene.add_kind(shape);
        let root = scene.add_kind(ObjectKind::ShapeVisual(ShapeVisual {
            shapes: vec![shape],
            ..Default::default()
        }));
        (scene, root, shape)
    }

    #[test]
    fn visual_defaults_are_unset() {
        let mut scene = Scene::new();
        let root = scene.add_kind(ObjectKind::ContainerVisual(Visual {
            opacity: Some(1.0),
            is_visible: Some(true),
            size: Some(Vec2::ZERO),
            center_point: Some(Vec3::new(5.0, 5.0, 0.0)),
            ..Default::default()
        }));

        assert_eq!(optimize_property_values(&mut scene, root).unwrap(), 1);
        assert_eq!(scene.get(root).unwrap().visual(), Some(&Visual::default()));
    }

    #[test]
    fn static_shape_transform_becomes_a_matrix() {
        let (mut scene, root, shape) = single_shape_scene(
            ObjectKind::ContainerShape(ContainerShape {
                shape: Shape {
                    offset: Some(Vec2::new(10.0, 0.0)),
                    scale: Some(Vec2::splat(2.0)),
                    ..Default::default()
                },
                shapes: vec![],
            }),
            vec![],
        );

        optimize_property_values(&mut scene, root).unwrap();
        let object = scene.get(shape).unwrap();
        let s = object.shape().unwrap();
        assert_eq!(s.offset, None);
        assert_eq!(s.scale, None);
        let matrix = s.transform_matrix.unwrap();
        assert_eq!(matrix.transform_point2(Vec2::ONE), Vec2::new(12.0, 2.0));
        assert_eq!(object.meta.short_description.as_deref(), Some("Scale:2,2, Offset:10,0"));
    }

    #[test]
    fn animated_shapes_keep_their_properties() {
        let mut container = CompositionObject::new(ObjectKind::ContainerShape(ContainerShape {
            shape: Shape {
                offset: Some(Vec2::new(1.0, 1.0)),
                center_point: Some(Vec2::new(3.0, 3.0)),
                ..Default::default()
            },
            shapes: vec![],
        }));
        container.start_animation(names::OFFSET, ObjectId(0), None);
        let mut scene = Scene::new();
        scene.add_kind(ObjectKind::LinearEasing);
        let shape = scene.add(container);
        let root = scene.add_kind(ObjectKind::ShapeVisual(ShapeVisual {
            shapes: vec![shape],
            ..Default::default()
        }));

        optimize_property_values(&mut scene, root).unwrap();
        let s = scene.get(shape).unwrap().shape().unwrap();
        assert_eq!(s.offset, Some(Vec2::new(1.0, 1.0)));
        // Unused without scale or rotation.
        assert_eq!(s.center_point, None);
        assert_eq!(s.transform_matrix, None);
    }

    #[test]
    fn closed_untrimmed_geometry_drops_caps() {
        let (mut scene, root, shape) = single_shape_scene(
            ObjectKind::SpriteShape(SpriteShape {
                geometry: Some(ObjectId(0)),
                stroke_start_cap: Some(StrokeCap::Round),
                stroke_end_cap: Some(StrokeCap::Round),
                stroke_line_join: Some(StrokeLineJoin::Round),
                stroke_thickness: Some(1.0),
                ..Default::default()
            }),
            vec![ObjectKind::EllipseGeometry(EllipseGeometry {
                geometry: Geometry {
                    trim_end: Some(1.0),
                    ..Default::default()
                },
                radius: Some(Vec2::splat(4.0)),
                ..Default::default()
            })],
        );

        optimize_property_values(&mut scene, root).unwrap();
        let ObjectKind::SpriteShape(sprite) = &scene.get(shape).unwrap().kind else {
            panic!("not a sprite shape");
        };
        assert_eq!(sprite.stroke_start_cap, None);
        assert_eq!(sprite.stroke_end_cap, None);
        assert_eq!(sprite.stroke_line_join, None);
        assert_eq!(sprite.stroke_thickness, None);
    }

    #[test]
    fn trimmed_geometry_keeps_caps() {
        let (mut scene, root, shape) = single_shape_scene(
            ObjectKind::SpriteShape(SpriteShape {
                geometry: Some(ObjectId(0)),
                stroke_start_cap: Some(StrokeCap::Round),
                ..Default::default()
            }),
            vec![ObjectKind::RectangleGeometry(RectangleGeometry {
                geometry: Geometry {
                    trim_end: Some(0.5),
                    ..Default::default()
                },
                ..Default::default()
            })],
        );

        optimize_property_values(&mut scene, root).unwrap();
        let ObjectKind::SpriteShape(sprite) = &scene.get(shape).unwrap().kind else {
            panic!("not a sprite shape");
        };
        assert_eq!(sprite.stroke_start_cap, Some(StrokeCap::Round));
    }

    #[test]
    fn second_pass_changes_nothing() {
        let (mut scene, root, _) = single_shape_scene(
            ObjectKind::ContainerShape(ContainerShape {
                shape: Shape {
                    rotation_angle_in_degrees: Some(45.0),
                    center_point: Some(Vec2::new(2.0, 2.0)),
                    ..Default::default()
                },
                shapes: vec![],
            }),
            vec![],
        );
        assert!(optimize_property_values(&mut scene, root).unwrap() > 0);
        assert_eq!(optimize_property_values(&mut scene, root).unwrap(), 0);
    }
}
