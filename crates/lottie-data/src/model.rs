use serde::{de::DeserializeOwned, de::SeqAccess, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Fields the model does not type, kept verbatim for serialization.
pub type Extra = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LottieJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    pub ip: f32,
    pub op: f32,
    pub fr: f32,
    pub w: u32,
    pub h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddd: Option<u8>,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<Marker>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LottieJson {
    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Length of the composition in frames.
    pub fn duration(&self) -> f32 {
        self.op - self.ip
    }
}

/// Layer content kind, as stored in the `ty` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    PreComp,
    Solid,
    Image,
    Null,
    Shape,
    Text,
    Other(u8),
}

impl From<u8> for LayerType {
    fn from(ty: u8) -> Self {
        match ty {
            0 => LayerType::PreComp,
            1 => LayerType::Solid,
            2 => LayerType::Image,
            3 => LayerType::Null,
            4 => LayerType::Shape,
            5 => LayerType::Text,
            other => LayerType::Other(other),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Layer {
    #[serde(default)]
    pub ty: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ind: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub ip: f32,
    #[serde(default)]
    pub op: f32,
    #[serde(default)]
    pub st: f32,
    #[serde(default = "default_one")]
    pub sr: f32, // Time stretch
    #[serde(default)]
    pub ks: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ao: Option<u8>, // Auto orient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tm: Option<Property<f32>>, // Time remap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddd: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bm: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tt: Option<u8>, // Matte mode of the layer below this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub td: Option<u8>, // 1 when this layer is used as a matte
    #[serde(
        default,
        rename = "masksProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub masks_properties: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef: Option<Vec<serde_json::Value>>,
    #[serde(default, rename = "refId", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shapes: Option<Vec<ShapeItem>>,
    #[serde(flatten)]
    pub extra: Extra,
}

fn default_one() -> f32 {
    1.0
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        LayerType::from(self.ty)
    }

    pub fn is_precomp(&self) -> bool {
        self.layer_type() == LayerType::PreComp
    }

    pub fn is_hidden(&self) -> bool {
        self.hd.unwrap_or(false)
    }

    pub fn is_3d(&self) -> bool {
        self.ddd.unwrap_or(0) != 0
    }

    /// True when this layer is masked by the layer immediately below it in the list.
    pub fn has_matte(&self) -> bool {
        self.tt.map_or(false, |tt| tt != 0)
    }

    pub fn has_masks(&self) -> bool {
        self.masks_properties.as_ref().map_or(false, |m| !m.is_empty())
    }

    pub fn has_effects(&self) -> bool {
        self.ef.as_ref().map_or(false, |e| !e.is_empty())
    }

    /// Window of layer-local time during which the layer is rendered. Local
    /// time at composition frame `t` is `(t - st) / sr`. `None` when the
    /// stretch does not map frames to local time.
    pub fn local_window(&self) -> Option<(f32, f32)> {
        if self.sr == 0.0 || !self.sr.is_finite() {
            return None;
        }
        let start = (self.ip - self.st) / self.sr;
        let end = (self.op - self.st) / self.sr;
        Some((start.min(end), start.max(end)))
    }

    /// Moves the layer in time without changing what it shows at each local frame.
    pub fn with_time_offset(&self, offset: f32) -> Layer {
        let mut layer = self.clone();
        layer.ip += offset;
        layer.op += offset;
        layer.st += offset;
        layer
    }
}

/// Layer or shape transform. Every field is optional so that absent
/// properties stay absent on output.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<Property<Vec3DefaultZero>>, // Anchor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<PositionProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Property<Vec3Scale>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ry: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rz: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Property<Vec3DefaultZero>>, // Orientation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sk: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sa: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<Property<f32>>,
    #[serde(flatten)]
    pub extra: Extra,
}

// Split must be tried first: a unified property would accept a split object
// with every typed field defaulted.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum PositionProperty {
    Split(SplitPosition),
    Unified(Property<Vec3DefaultZero>),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SplitPosition {
    #[serde(default)]
    pub s: bool,
    pub x: Property<f32>,
    pub y: Property<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Property<f32>>,
}

// Shapes

/// A shape list entry. Shape kinds the optimizer does not model are kept as raw JSON.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ShapeItem {
    Known(Shape),
    Raw(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "ty")]
pub enum Shape {
    #[serde(rename = "gr")]
    Group(GroupShape),
    #[serde(rename = "rc")]
    Rect(RectShape),
    #[serde(rename = "el")]
    Ellipse(EllipseShape),
    #[serde(rename = "sr")]
    Polystar(PolystarShape),
    #[serde(rename = "sh")]
    Path(PathShape),
    #[serde(rename = "fl")]
    Fill(FillShape),
    #[serde(rename = "st")]
    Stroke(StrokeShape),
    #[serde(rename = "gf")]
    GradientFill(GradientFillShape),
    #[serde(rename = "gs")]
    GradientStroke(GradientStrokeShape),
    #[serde(rename = "tm")]
    Trim(TrimShape),
    #[serde(rename = "tr")]
    Transform(TransformShape),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default)]
    pub it: Vec<ShapeItem>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RectShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Property<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Property<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<Property<f32>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EllipseShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Property<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Property<Vec2>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PolystarShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Property<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ir: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pt: Option<Property<f32>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    pub ks: Property<BezierPath>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FillShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<Property<Vec<f32>>>, // RGB or RGBA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<Property<f32>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StrokeShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<Property<Vec<f32>>>, // RGB or RGBA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Vec<DashProperty>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DashProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    pub v: Property<f32>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GradientFillShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Property<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<Property<Vec2>>,
    pub g: GradientColors,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GradientStrokeShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Property<Vec2>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<Property<Vec2>>,
    pub g: GradientColors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Vec<DashProperty>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Gradient data: `p` colour stops of `[offset, r, g, b]`, optionally
/// followed by opacity stops of `[offset, alpha]`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GradientColors {
    pub p: u32,
    pub k: Property<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrimShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<Property<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<Property<f32>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransformShape {
    #[serde(flatten)]
    pub t: Transform,
}

// Animated properties

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    pub k: Value<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ix: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>, // Expression
    #[serde(flatten)]
    pub extra: Extra,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
            ix: None,
            x: None,
            extra: Extra::new(),
        }
    }
}

impl<T> Property<T> {
    pub fn fixed(value: T) -> Self {
        Property {
            k: Value::Static(value),
            ..Property::default()
        }
    }

    pub fn animated(keyframes: Vec<Keyframe<T>>) -> Self {
        Property {
            a: 1,
            k: Value::Animated(keyframes),
            ..Property::default()
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self.k, Value::Animated(_))
    }

    pub fn has_expression(&self) -> bool {
        self.x.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value<T> {
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;

        if v.is_null() {
            return Ok(Value::Default);
        }

        if let Ok(keyframes) = serde_json::from_value::<Vec<Keyframe<T>>>(v.clone()) {
            return Ok(Value::Animated(keyframes));
        }

        if let Ok(val) = serde_json::from_value::<T>(v.clone()) {
            return Ok(Value::Static(val));
        }

        // Scalars are sometimes wrapped in a one-element array.
        if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
            if let Some(first) = vec.into_iter().next() {
                return Ok(Value::Static(first));
            }
        }

        // Failing here lets an enclosing untagged shape fall back to raw JSON
        // instead of silently dropping the value.
        Err(serde::de::Error::custom("unsupported property value"))
    }
}

impl<T: Serialize> Serialize for Value<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Default => serializer.serialize_none(),
            Value::Static(v) => v.serialize(serializer),
            Value::Animated(keyframes) => keyframes.serialize(serializer),
        }
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct Keyframe<T> {
    pub t: f32,
    #[serde(
        default,
        deserialize_with = "deserialize_keyframe_value",
        serialize_with = "serialize_keyframe_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub s: Option<T>,
    #[serde(
        default,
        deserialize_with = "deserialize_keyframe_value",
        serialize_with = "serialize_keyframe_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub e: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i: Option<BezierTangent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub o: Option<BezierTangent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ti: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u8>,
}

impl<T> Keyframe<T> {
    pub fn at(t: f32, value: T) -> Self {
        Keyframe {
            t,
            s: Some(value),
            e: None,
            i: None,
            o: None,
            to: None,
            ti: None,
            h: None,
        }
    }
}

fn deserialize_keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }

    if let Ok(val) = serde_json::from_value(v.clone()) {
        return Ok(Some(val));
    }

    if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
        if let Some(first) = vec.into_iter().next() {
            return Ok(Some(first));
        }
    }

    Ok(None)
}

// Players index scalar keyframe values as one-element arrays.
fn serialize_keyframe_value<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let json = serde_json::to_value(value).map_err(serde::ser::Error::custom)?;
    if json.is_number() {
        vec![json].serialize(serializer)
    } else {
        json.serialize(serializer)
    }
}

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];

/// Bezier easing handle of a keyframe, `{"x": [0.48], "y": [1]}` or `{"x": 0.48, "y": 1}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BezierTangent {
    #[serde(deserialize_with = "deserialize_scalar_or_vec")]
    pub x: Vec<f32>,
    #[serde(deserialize_with = "deserialize_scalar_or_vec")]
    pub y: Vec<f32>,
}

impl BezierTangent {
    pub fn new(x: f32, y: f32) -> Self {
        BezierTangent {
            x: vec![x],
            y: vec![y],
        }
    }
}

fn deserialize_scalar_or_vec<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScalarOrVec {
        Scalar(f32),
        Vec(Vec<f32>),
    }

    Ok(match ScalarOrVec::deserialize(deserializer)? {
        ScalarOrVec::Scalar(v) => vec![v],
        ScalarOrVec::Vec(v) => v,
    })
}

fn visit_padded_vec3<'de, A>(mut seq: A, default_z: f32) -> Result<Vec3, A::Error>
where
    A: SeqAccess<'de>,
{
    let x = seq.next_element()?.unwrap_or(0.0);
    let y = seq.next_element()?.unwrap_or(0.0);
    let z = seq.next_element()?.unwrap_or(default_z);
    while seq.next_element::<f32>()?.is_some() {}
    Ok([x, y, z])
}

/// A 2- or 3-component vector whose missing Z is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3DefaultZero(pub Vec3);

impl Default for Vec3DefaultZero {
    fn default() -> Self {
        Vec3DefaultZero([0.0, 0.0, 0.0])
    }
}

impl<'de> Deserialize<'de> for Vec3DefaultZero {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Vec3Visitor;
        impl<'de> serde::de::Visitor<'de> for Vec3Visitor {
            type Value = Vec3DefaultZero;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of 2 or 3 floats")
            }
            fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                visit_padded_vec3(seq, 0.0).map(Vec3DefaultZero)
            }
        }
        deserializer.deserialize_seq(Vec3Visitor)
    }
}

/// Scale percentages; a missing Z is 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3Scale(pub Vec3);

impl Default for Vec3Scale {
    fn default() -> Self {
        Vec3Scale([100.0, 100.0, 100.0])
    }
}

impl<'de> Deserialize<'de> for Vec3Scale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Vec3ScaleVisitor;
        impl<'de> serde::de::Visitor<'de> for Vec3ScaleVisitor {
            type Value = Vec3Scale;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of 2 or 3 floats")
            }
            fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                visit_padded_vec3(seq, 100.0).map(Vec3Scale)
            }
        }
        deserializer.deserialize_seq(Vec3ScaleVisitor)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BezierPath {
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Asset {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<Layer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr: Option<f32>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Asset {
    pub fn layer_collection(id: impl Into<String>, layers: Vec<Layer>) -> Self {
        Asset {
            id: id.into(),
            nm: None,
            layers: Some(layers),
            w: None,
            h: None,
            fr: None,
            extra: Extra::new(),
        }
    }

    pub fn is_layer_collection(&self) -> bool {
        self.layers.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Marker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cm: Option<String>, // Name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tm: Option<f32>, // Frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr: Option<f32>, // Duration
}

impl Marker {
    pub fn new(name: impl Into<String>, frame: f32, duration: f32) -> Self {
        Marker {
            cm: Some(name.into()),
            tm: Some(frame),
            dr: Some(duration),
        }
    }

    pub fn name(&self) -> &str {
        self.cm.as_deref().unwrap_or("")
    }

    pub fn frame(&self) -> f32 {
        self.tm.unwrap_or(0.0)
    }

    pub fn with_time_offset(&self, offset: f32) -> Marker {
        Marker {
            tm: Some(self.frame() + offset),
            ..self.clone()
        }
    }
}
