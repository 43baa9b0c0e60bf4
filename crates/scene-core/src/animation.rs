use crate::error::{SceneError, SceneResult};
use crate::object::{Color, ObjectId};
use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Domain of the values a key frame animation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Boolean,
    Scalar,
    Vector2,
    Vector3,
    Vector4,
    Color,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AnimationValue {
    Boolean(bool),
    Scalar(f32),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Color(Color),
    Path(ObjectId),
}

impl AnimationValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            AnimationValue::Boolean(_) => ValueType::Boolean,
            AnimationValue::Scalar(_) => ValueType::Scalar,
            AnimationValue::Vector2(_) => ValueType::Vector2,
            AnimationValue::Vector3(_) => ValueType::Vector3,
            AnimationValue::Vector4(_) => ValueType::Vector4,
            AnimationValue::Color(_) => ValueType::Color,
            AnimationValue::Path(_) => ValueType::Path,
        }
    }

    /// Value `t` of the way from `self` to `to`. Booleans and paths do not
    /// interpolate and switch only when `t` reaches 1.
    pub fn lerp(&self, to: &AnimationValue, t: f32) -> SceneResult<AnimationValue> {
        let value = match (self, to) {
            (AnimationValue::Scalar(a), AnimationValue::Scalar(b)) => {
                AnimationValue::Scalar(a + (b - a) * t)
            }
            (AnimationValue::Vector2(a), AnimationValue::Vector2(b)) => {
                AnimationValue::Vector2(a.lerp(*b, t))
            }
            (AnimationValue::Vector3(a), AnimationValue::Vector3(b)) => {
                AnimationValue::Vector3(a.lerp(*b, t))
            }
            (AnimationValue::Vector4(a), AnimationValue::Vector4(b)) => {
                AnimationValue::Vector4(a.lerp(*b, t))
            }
            (AnimationValue::Color(a), AnimationValue::Color(b)) => {
                AnimationValue::Color(Color::from_vec4(a.to_vec4().lerp(b.to_vec4(), t)))
            }
            (AnimationValue::Boolean(_), AnimationValue::Boolean(_))
            | (AnimationValue::Path(_), AnimationValue::Path(_)) => {
                if t >= 1.0 {
                    to.clone()
                } else {
                    self.clone()
                }
            }
            _ => {
                return Err(SceneError::invariant(format!(
                    "cannot interpolate {:?} to {:?}",
                    self.value_type(),
                    to.value_type()
                )))
            }
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFrameValue {
    Value(AnimationValue),
    Expression(String),
}

/// One sample of a key frame animation. `easing` shapes the segment that ends
/// at this key frame; `None` is linear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    pub progress: f32,
    pub value: KeyFrameValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KeyFrameAnimationData")]
pub struct KeyFrameAnimation {
    value_type: ValueType,
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    key_frames: Vec<KeyFrame>,
}

#[derive(Deserialize)]
struct KeyFrameAnimationData {
    value_type: ValueType,
    duration: Duration,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    key_frames: Vec<KeyFrame>,
}

impl TryFrom<KeyFrameAnimationData> for KeyFrameAnimation {
    type Error = SceneError;

    fn try_from(data: KeyFrameAnimationData) -> SceneResult<Self> {
        let mut animation = KeyFrameAnimation::new(data.value_type, data.duration);
        animation.target = data.target;
        for key_frame in data.key_frames {
            animation.push(key_frame)?;
        }
        Ok(animation)
    }
}

impl KeyFrameAnimation {
    pub fn new(value_type: ValueType, duration: Duration) -> Self {
        Self {
            value_type,
            duration,
            target: None,
            key_frames: Vec::new(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn key_frames(&self) -> &[KeyFrame] {
        &self.key_frames
    }

    pub fn insert_key_frame(
        &mut self,
        progress: f32,
        value: AnimationValue,
        easing: Option<ObjectId>,
    ) -> SceneResult<()> {
        self.push(KeyFrame {
            progress,
            value: KeyFrameValue::Value(value),
            easing,
        })
    }

    pub fn insert_expression_key_frame(
        &mut self,
        progress: f32,
        expression: impl Into<String>,
        easing: Option<ObjectId>,
    ) -> SceneResult<()> {
        self.push(KeyFrame {
            progress,
            value: KeyFrameValue::Expression(expression.into()),
            easing,
        })
    }

    fn push(&mut self, key_frame: KeyFrame) -> SceneResult<()> {
        if !(0.0..=1.0).contains(&key_frame.progress) {
            return Err(SceneError::invariant(format!(
                "key frame progress {} outside 0..=1",
                key_frame.progress
            )));
        }
        if let Some(last) = self.key_frames.last() {
            if key_frame.progress <= last.progress {
                return Err(SceneError::invariant(format!(
                    "key frame progress {} does not follow {}",
                    key_frame.progress, last.progress
                )));
            }
        }
        if let KeyFrameValue::Value(value) = &key_frame.value {
            if value.value_type() != self.value_type {
                return Err(SceneError::invariant(format!(
                    "{:?} key frame in a {:?} animation",
                    value.value_type(),
                    self.value_type
                )));
            }
        }
        self.key_frames.push(key_frame);
        Ok(())
    }

    pub(crate) fn references_mut(&mut self) -> impl Iterator<Item = &mut ObjectId> {
        self.key_frames.iter_mut().flat_map(|kf| {
            let value = match &mut kf.value {
                KeyFrameValue::Value(AnimationValue::Path(path)) => Some(path),
                _ => None,
            };
            value.into_iter().chain(kf.easing.as_mut())
        })
    }
}

/// An animation computed from other objects' properties at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionAnimation {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Named objects the expression reads from, in name order.
    #[serde(default)]
    pub reference_parameters: BTreeMap<String, ObjectId>,
}

impl ExpressionAnimation {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            target: None,
            reference_parameters: BTreeMap::new(),
        }
    }

    pub fn with_reference(mut self, name: impl Into<String>, object: ObjectId) -> Self {
        self.reference_parameters.insert(name.into(), object);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_frames_must_advance() {
        let mut animation = KeyFrameAnimation::new(ValueType::Scalar, Duration::from_secs(1));
        animation
            .insert_key_frame(0.0, AnimationValue::Scalar(1.0), None)
            .unwrap();
        animation
            .insert_key_frame(0.5, AnimationValue::Scalar(2.0), None)
            .unwrap();

        let err = animation
            .insert_key_frame(0.5, AnimationValue::Scalar(3.0), None)
            .unwrap_err();
        assert!(matches!(err, SceneError::Invariant(_)));
        assert_eq!(animation.key_frames().len(), 2);
    }

    #[test]
    fn value_type_is_fixed() {
        let mut animation = KeyFrameAnimation::new(ValueType::Boolean, Duration::from_secs(1));
        assert!(animation
            .insert_key_frame(0.0, AnimationValue::Scalar(1.0), None)
            .is_err());
        assert!(animation
            .insert_expression_key_frame(0.0, "this.StartingValue", None)
            .is_ok());
    }

    #[test]
    fn deserializing_checks_key_frame_order() {
        let json = serde_json::json!({
            "value_type": "Scalar",
            "duration": { "secs": 1, "nanos": 0 },
            "key_frames": [
                { "progress": 0.5, "value": { "value": { "type": "Scalar", "value": 1.0 } } },
                { "progress": 0.2, "value": { "value": { "type": "Scalar", "value": 2.0 } } }
            ]
        });
        assert!(serde_json::from_value::<KeyFrameAnimation>(json).is_err());
    }

    #[test]
    fn booleans_switch_at_the_end_of_a_segment() {
        let on = AnimationValue::Boolean(true);
        let off = AnimationValue::Boolean(false);
        assert_eq!(on.lerp(&off, 0.99).unwrap(), on);
        assert_eq!(on.lerp(&off, 1.0).unwrap(), off);
        assert_eq!(
            AnimationValue::Scalar(0.0)
                .lerp(&AnimationValue::Scalar(10.0), 0.25)
                .unwrap(),
            AnimationValue::Scalar(2.5)
        );
    }
}
