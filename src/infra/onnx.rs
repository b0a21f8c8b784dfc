// ============================================================
// Infrastructure — ONNX Exporter
// ============================================================
// Writes a trained model as an ONNX ModelProto.
//
// ONNX files are Protocol Buffers. Only the encoding side is
// needed here, and only for the handful of messages an exported
// feed-forward graph uses:
//
//   ModelProto ─ GraphProto ─┬─ NodeProto        (Gemm, Relu, ...)
//                            ├─ TensorProto      (weights, initializers)
//                            └─ ValueInfoProto   (graph inputs/outputs)
//
// Every exported graph has the same external contract:
//   input  "x"     : float [batch_size, in_features]
//   output "out_x" : float [batch_size, out_features]
// where "batch_size" is a symbolic (dynamic) dimension.
//
// Field numbers follow onnx.proto3:
//   https://github.com/onnx/onnx/blob/main/onnx/onnx.proto3

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::underscore;
use crate::error::Result;

/// Name of the graph input tensor.
pub const INPUT_NAME: &str = "x";
/// Name of the graph output tensor.
pub const OUTPUT_NAME: &str = "out_x";
/// Symbolic name of the dynamic leading dimension.
pub const BATCH_AXIS: &str = "batch_size";

/// Opset 10 pairs with IR version 5.
pub const OPSET_VERSION: i64 = 10;
pub const IR_VERSION: i64 = 5;

/// TensorProto.DataType.FLOAT
pub const ONNX_FLOAT: i32 = 1;

// ─── Protobuf wire encoder ────────────────────────────────────────────────────

#[derive(Default)]
struct PbEncoder {
    buf: Vec<u8>,
}

impl PbEncoder {
    fn new() -> Self {
        Self::default()
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_varint(&mut self, mut val: u64) {
        loop {
            let byte = (val & 0x7F) as u8;
            val >>= 7;
            if val == 0 {
                self.buf.push(byte);
                break;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// field_number << 3 | wire_type
    fn write_tag(&mut self, field: u32, wire_type: u32) {
        self.write_varint(((field as u64) << 3) | wire_type as u64);
    }

    fn write_varint_field(&mut self, field: u32, val: u64) {
        self.write_tag(field, 0);
        self.write_varint(val);
    }

    /// int64 fields are plain varints; negatives take ten bytes.
    fn write_int64_field(&mut self, field: u32, val: i64) {
        self.write_varint_field(field, val as u64);
    }

    fn write_float_field(&mut self, field: u32, val: f32) {
        self.write_tag(field, 5);
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    fn write_bytes_field(&mut self, field: u32, data: &[u8]) {
        self.write_tag(field, 2);
        self.write_varint(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    fn write_string_field(&mut self, field: u32, val: &str) {
        self.write_bytes_field(field, val.as_bytes());
    }

    fn write_message_field(&mut self, field: u32, message: PbEncoder) {
        self.write_bytes_field(field, &message.buf);
    }
}

// ─── TensorProto ──────────────────────────────────────────────────────────────

/// A named float tensor stored as an initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct OnnxTensor {
    pub name: String,
    pub dims: Vec<i64>,
    pub data: Vec<f32>,
}

impl OnnxTensor {
    pub fn new(name: impl Into<String>, dims: Vec<i64>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            dims,
            data,
        }
    }

    fn encode(&self) -> PbEncoder {
        let mut enc = PbEncoder::new();
        for &d in &self.dims {
            enc.write_int64_field(1, d); // dims
        }
        enc.write_varint_field(2, ONNX_FLOAT as u64); // data_type
        enc.write_string_field(8, &self.name); // name
        let raw: Vec<u8> = self.data.iter().flat_map(|v| v.to_le_bytes()).collect();
        enc.write_bytes_field(9, &raw); // raw_data
        enc
    }
}

// ─── NodeProto ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OnnxAttribute {
    Int(i64),
    Float(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnnxNode {
    pub name: String,
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attributes: BTreeMap<String, OnnxAttribute>,
}

impl OnnxNode {
    pub fn new(op_type: &str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn attr(mut self, key: &str, value: OnnxAttribute) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    fn encode(&self) -> PbEncoder {
        let mut enc = PbEncoder::new();
        for input in &self.inputs {
            enc.write_string_field(1, input);
        }
        for output in &self.outputs {
            enc.write_string_field(2, output);
        }
        enc.write_string_field(3, &self.name);
        enc.write_string_field(4, &self.op_type);
        for (key, value) in &self.attributes {
            enc.write_message_field(5, encode_attribute(key, value));
        }
        enc
    }
}

fn encode_attribute(name: &str, value: &OnnxAttribute) -> PbEncoder {
    let mut enc = PbEncoder::new();
    enc.write_string_field(1, name);
    match value {
        OnnxAttribute::Float(f) => {
            enc.write_float_field(2, *f); // f
            enc.write_varint_field(20, 1); // type = FLOAT
        }
        OnnxAttribute::Int(i) => {
            enc.write_int64_field(3, *i); // i
            enc.write_varint_field(20, 2); // type = INT
        }
    }
    enc
}

// ─── ValueInfoProto ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    Fixed(i64),
    Symbolic(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueInfo {
    pub name: String,
    pub dims: Vec<Dim>,
}

impl ValueInfo {
    /// `[batch_size, width]` with a dynamic batch dimension.
    pub fn batched(name: &str, width: usize) -> Self {
        Self {
            name: name.to_string(),
            dims: vec![Dim::Symbolic(BATCH_AXIS.to_string()), Dim::Fixed(width as i64)],
        }
    }

    fn encode(&self) -> PbEncoder {
        let mut shape = PbEncoder::new();
        for dim in &self.dims {
            let mut d = PbEncoder::new();
            match dim {
                Dim::Fixed(v) => d.write_int64_field(1, *v), // dim_value
                Dim::Symbolic(p) => d.write_string_field(2, p), // dim_param
            }
            shape.write_message_field(1, d);
        }

        let mut tensor_type = PbEncoder::new();
        tensor_type.write_varint_field(1, ONNX_FLOAT as u64); // elem_type
        tensor_type.write_message_field(2, shape);

        let mut type_proto = PbEncoder::new();
        type_proto.write_message_field(1, tensor_type);

        let mut vi = PbEncoder::new();
        vi.write_string_field(1, &self.name);
        vi.write_message_field(2, type_proto);
        vi
    }
}

// ─── ModelProto ───────────────────────────────────────────────────────────────

/// An exportable graph plus the metadata around it.
#[derive(Debug, Clone, PartialEq)]
pub struct OnnxModel {
    pub producer_name: String,
    pub producer_version: String,
    pub graph_name: String,
    pub nodes: Vec<OnnxNode>,
    pub initializers: Vec<OnnxTensor>,
    pub inputs: Vec<ValueInfo>,
    pub outputs: Vec<ValueInfo>,
}

impl OnnxModel {
    /// An empty graph with the standard `x` → `out_x` contract.
    pub fn new(graph_name: &str, in_features: usize, out_features: usize) -> Self {
        Self {
            producer_name: env!("CARGO_PKG_NAME").to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            graph_name: graph_name.to_string(),
            nodes: Vec::new(),
            initializers: Vec::new(),
            inputs: vec![ValueInfo::batched(INPUT_NAME, in_features)],
            outputs: vec![ValueInfo::batched(OUTPUT_NAME, out_features)],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut graph = PbEncoder::new();
        for node in &self.nodes {
            graph.write_message_field(1, node.encode());
        }
        graph.write_string_field(2, &self.graph_name);
        for init in &self.initializers {
            graph.write_message_field(5, init.encode());
        }
        for input in &self.inputs {
            graph.write_message_field(11, input.encode());
        }
        for output in &self.outputs {
            graph.write_message_field(12, output.encode());
        }

        let mut opset = PbEncoder::new();
        opset.write_string_field(1, ""); // default domain
        opset.write_int64_field(2, OPSET_VERSION);

        let mut model = PbEncoder::new();
        model.write_int64_field(1, IR_VERSION);
        model.write_string_field(2, &self.producer_name);
        model.write_string_field(3, &self.producer_version);
        model.write_message_field(7, graph);
        model.write_message_field(8, opset);
        model.into_bytes()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes())?;
        tracing::info!(
            "Exported ONNX graph '{}' ({} nodes, {} initializers) to '{}'",
            self.graph_name,
            self.nodes.len(),
            self.initializers.len(),
            path.display()
        );
        Ok(())
    }
}

/// `<output_dir>/<snake_case(model_name)>.onnx`
pub fn export_path(output_dir: impl AsRef<Path>, model_name: &str) -> PathBuf {
    output_dir
        .as_ref()
        .join(format!("{}.onnx", underscore(model_name)))
}

#[cfg(test)]
pub(crate) mod wire {
    //! Just enough of a protobuf reader to inspect exported files in tests.

    #[derive(Debug, Clone)]
    pub enum Field<'a> {
        Varint(u64),
        Bytes(&'a [u8]),
        Fixed32(u32),
    }

    fn read_varint(data: &[u8], pos: &mut usize) -> u64 {
        let mut out = 0u64;
        let mut shift = 0;
        loop {
            let byte = data[*pos];
            *pos += 1;
            out |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return out;
            }
            shift += 7;
        }
    }

    pub fn fields(data: &[u8]) -> Vec<(u32, Field<'_>)> {
        let mut pos = 0;
        let mut out = Vec::new();
        while pos < data.len() {
            let tag = read_varint(data, &mut pos);
            let field = (tag >> 3) as u32;
            let value = match tag & 7 {
                0 => Field::Varint(read_varint(data, &mut pos)),
                2 => {
                    let len = read_varint(data, &mut pos) as usize;
                    let bytes = &data[pos..pos + len];
                    pos += len;
                    Field::Bytes(bytes)
                }
                5 => {
                    let bytes = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
                    pos += 4;
                    Field::Fixed32(u32::from_le_bytes(bytes))
                }
                other => panic!("unexpected wire type {other}"),
            };
            out.push((field, value));
        }
        out
    }

    pub fn bytes_of<'a>(data: &'a [u8], field: u32) -> Vec<&'a [u8]> {
        fields(data)
            .into_iter()
            .filter_map(|(f, v)| match v {
                Field::Bytes(b) if f == field => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn strings_of(data: &[u8], field: u32) -> Vec<String> {
        bytes_of(data, field)
            .into_iter()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
    }

    pub fn varint_of(data: &[u8], field: u32) -> Option<u64> {
        fields(data).into_iter().find_map(|(f, v)| match v {
            Field::Varint(x) if f == field => Some(x),
            _ => None,
        })
    }

    /// (name, dims) of every ValueInfoProto under `field` of a GraphProto;
    /// symbolic dims come back as their parameter name.
    pub fn value_infos(graph: &[u8], field: u32) -> Vec<(String, Vec<String>)> {
        bytes_of(graph, field)
            .into_iter()
            .map(|vi| {
                let name = strings_of(vi, 1).remove(0);
                let ty = bytes_of(vi, 2)[0];
                let tensor = bytes_of(ty, 1)[0];
                let shape = bytes_of(tensor, 2)[0];
                let dims = bytes_of(shape, 1)
                    .into_iter()
                    .map(|d| match strings_of(d, 2).pop() {
                        Some(param) => param,
                        None => varint_of(d, 1).unwrap_or(0).to_string(),
                    })
                    .collect();
                (name, dims)
            })
            .collect()
    }
}
