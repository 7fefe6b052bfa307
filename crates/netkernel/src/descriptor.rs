//! # Model descriptors
//!
//! A descriptor binds a pretrained network's files, layer names and
//! preprocessing rules. It is parsed from a TOML document:
//!
//! ```toml
//! [net]
//! model = "nets/resnet.json"
//! weights = "nets/resnet.safetensors"
//! input_layers = ["data"]
//! output_layers = ["prob"]
//! input_width = 224
//! preserve_aspect_ratio = true
//! pad_mod = 32
//!
//! [net.input]
//! dimensions = ["batch", "channel", "height", "width"]
//! channel_ordering = ["blue", "green", "red"]
//!
//! [mean-image]
//! colors = { red = 122.7, green = 116.6, blue = 104.0 }
//! ```
//!
//! The document is walked as a [`toml::Table`] rather than deserialized, so a
//! missing entry is reported with its full key path.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use toml::{Table, Value};
use tracing::{debug, warn};
use crate::error::{Error, Result};

/// Key path reported when the document itself cannot be read or parsed
pub const DOCUMENT_KEY: &str = "<document>";

/// Mean subtracted from every input frame before it reaches the network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MeanImage {
    /// One scalar per channel, in the descriptor's channel ordering
    Colors(Vec<f32>),
    /// A full `width * height * 3` image
    Image {
        width: u32,
        height: u32,
        data: Vec<f32>,
    },
    /// No mean subtraction
    Empty,
}

/// Validated description of a network's I/O contract and preprocessing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub model_path: PathBuf,
    pub weights_path: PathBuf,
    /// Positionally bound to the kernel's input columns
    pub input_layer_names: Vec<String>,
    /// Positionally bound to the kernel's output columns
    pub output_layer_names: Vec<String>,
    pub dimension_ordering: Vec<String>,
    pub channel_ordering: Vec<String>,
    pub input_width: Option<u32>,
    pub input_height: Option<u32>,
    pub preserve_aspect_ratio: bool,
    pub pad_mod: Option<u32>,
    pub normalize: bool,
    pub transpose: bool,
    pub mean_image: MeanImage,
}

impl ModelDescriptor {
    /// Read and parse a descriptor document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|err| {
            Error::config(DOCUMENT_KEY, format!("cannot read {}: {err}", path.display()))
        })?;
        parse_descriptor(&document)
    }

    pub fn num_inputs(&self) -> usize {
        self.input_layer_names.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.output_layer_names.len()
    }
}

/// Parse a TOML descriptor document
pub fn parse_descriptor(document: &str) -> Result<ModelDescriptor> {
    let root: Table = document
        .parse()
        .map_err(|err: toml::de::Error| Error::config(DOCUMENT_KEY, err.message().to_string()))?;
    descriptor_from_table(&root)
}

/// Build a descriptor from an already parsed document
pub fn descriptor_from_table(root: &Table) -> Result<ModelDescriptor> {
    let net = require_table(root, "", "net", "net description map")?;
    let model = require(net, "net", "model", "path to model")?;
    let weights = require(net, "net", "weights", "path to model weights")?;
    let input_layers = require(net, "net", "input_layers", "names of input layers")?;
    let output_layers = require(net, "net", "output_layers", "names of output layers")?;
    let input = require_table(net, "net", "input", "description of net input format")?;
    let dimensions = require(input, "net.input", "dimensions", "ordering of dimensions for input format")?;
    let channels = require(input, "net.input", "channel_ordering", "ordering of channels for input format")?;

    let model_path = PathBuf::from(string(model, "net.model")?);
    let weights_path = PathBuf::from(string(weights, "net.weights")?);
    let input_layer_names = non_empty(string_list(input_layers, "net.input_layers")?, "net.input_layers")?;
    let output_layer_names = non_empty(string_list(output_layers, "net.output_layers")?, "net.output_layers")?;
    let dimension_ordering = string_list(dimensions, "net.input.dimensions")?;
    let channel_ordering = string_list(channels, "net.input.channel_ordering")?;

    let preserve_aspect_ratio = optional_bool(net, "net", "preserve_aspect_ratio")?;
    let width = optional_positive(net, "net", "input_width")?;
    let height = optional_positive(net, "net", "input_height")?;
    let (input_width, input_height) = resolve_target(preserve_aspect_ratio, width, height)?;

    let pad_mod = optional_positive(net, "net", "pad_mod")?;
    let normalize = optional_bool(net, "net", "normalize")?;
    let transpose = optional_bool(net, "net", "transpose")?;

    let mean = require_table(root, "", "mean-image", "mean image description map")?;
    let mean_image = parse_mean_image(mean, &channel_ordering)?;

    let descriptor = ModelDescriptor {
        model_path,
        weights_path,
        input_layer_names,
        output_layer_names,
        dimension_ordering,
        channel_ordering,
        input_width,
        input_height,
        preserve_aspect_ratio,
        pad_mod,
        normalize,
        transpose,
        mean_image,
    };
    debug!(
        model = %descriptor.model_path.display(),
        inputs = ?descriptor.input_layer_names,
        outputs = ?descriptor.output_layer_names,
        "parsed net descriptor"
    );
    Ok(descriptor)
}

fn resolve_target(
    preserve_aspect_ratio: bool,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(Option<u32>, Option<u32>)> {
    if preserve_aspect_ratio {
        return match (width, height) {
            (Some(w), None) => Ok((Some(w), None)),
            (None, Some(h)) => Ok((None, Some(h))),
            _ => Err(Error::config(
                "net.preserve_aspect_ratio",
                "must specify exactly one of input_width or input_height",
            )),
        };
    }
    match (width, height) {
        (Some(w), Some(h)) => Ok((Some(w), Some(h))),
        (None, None) => Ok((None, None)),
        (w, h) => {
            warn!(
                input_width = ?w,
                input_height = ?h,
                "ignoring lone input dimension without preserve_aspect_ratio"
            );
            Ok((None, None))
        }
    }
}

fn parse_mean_image(mean: &Table, channel_ordering: &[String]) -> Result<MeanImage> {
    let alternatives = ["colors", "path", "empty"]
        .iter()
        .filter(|key| mean.contains_key(**key))
        .count();
    if alternatives > 1 {
        return Err(Error::config(
            "mean-image",
            "must specify only one of colors, path or empty",
        ));
    }

    if let Some(colors) = mean.get("colors") {
        let colors = colors
            .as_table()
            .ok_or_else(|| Error::config("mean-image.colors", "expected a table of channel means"))?;
        let blue = float(require(colors, "mean-image.colors", "blue", "blue channel mean")?, "mean-image.colors.blue")?;
        let green = float(require(colors, "mean-image.colors", "green", "green channel mean")?, "mean-image.colors.green")?;
        let red = float(require(colors, "mean-image.colors", "red", "red channel mean")?, "mean-image.colors.red")?;

        let means = channel_ordering
            .iter()
            .filter_map(|channel| match channel.as_str() {
                "red" => Some(red),
                "green" => Some(green),
                "blue" => Some(blue),
                _ => None,
            })
            .collect();
        return Ok(MeanImage::Colors(means));
    }

    if let Some(path) = mean.get("path") {
        let path = PathBuf::from(string(path, "mean-image.path")?);
        let width = positive(require(mean, "mean-image", "width", "width of mean")?, "mean-image.width")?;
        let height = positive(require(mean, "mean-image", "height", "height of mean")?, "mean-image.height")?;
        let data = read_mean_blob(&path, width as usize * height as usize * 3)?;
        return Ok(MeanImage::Image { width, height, data });
    }

    if mean.contains_key("empty") {
        return Ok(MeanImage::Empty);
    }

    Err(Error::config(
        "mean-image",
        "must specify color channel values (colors), a mean image file (path) or that there is no mean (empty)",
    ))
}

/// Load `count` little-endian floats from a mean image blob
fn read_mean_blob(path: &Path, count: usize) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path).map_err(|err| {
        Error::config("mean-image.path", format!("cannot read {}: {err}", path.display()))
    })?;
    let needed = count * std::mem::size_of::<f32>();
    if bytes.len() < needed {
        return Err(Error::config(
            "mean-image.path",
            format!("{} holds {} bytes, mean image needs {needed}", path.display(), bytes.len()),
        ));
    }
    let words: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes[..needed]);
    Ok(words.into_iter().map(|w| f32::from_bits(u32::from_le(w))).collect())
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn require<'a>(table: &'a Table, prefix: &str, key: &str, what: &str) -> Result<&'a Value> {
    table.get(key).ok_or_else(|| Error::missing(join(prefix, key), what))
}

fn require_table<'a>(table: &'a Table, prefix: &str, key: &str, what: &str) -> Result<&'a Table> {
    require(table, prefix, key, what)?
        .as_table()
        .ok_or_else(|| Error::config(join(prefix, key), "expected a table"))
}

fn string(value: &Value, key: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::config(key, "expected a string"))
}

fn string_list(value: &Value, key: &str) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::config(key, "expected a list of strings"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| string(item, &format!("{key}[{i}]")))
        .collect()
}

fn non_empty(names: Vec<String>, key: &str) -> Result<Vec<String>> {
    if names.is_empty() {
        return Err(Error::config(key, "must name at least one layer"));
    }
    Ok(names)
}

fn float(value: &Value, key: &str) -> Result<f32> {
    match value {
        Value::Float(f) => Ok(*f as f32),
        Value::Integer(i) => Ok(*i as f32),
        _ => Err(Error::config(key, "expected a number")),
    }
}

fn positive(value: &Value, key: &str) -> Result<u32> {
    let raw = value
        .as_integer()
        .ok_or_else(|| Error::config(key, "expected an integer"))?;
    u32::try_from(raw)
        .ok()
        .filter(|v| *v > 0 && *v <= i32::MAX as u32)
        .ok_or_else(|| Error::config(key, format!("expected an integer in 1..={}, got {raw}", i32::MAX)))
}

fn optional_positive(table: &Table, prefix: &str, key: &str) -> Result<Option<u32>> {
    table
        .get(key)
        .map(|v| positive(v, &join(prefix, key)))
        .transpose()
}

fn optional_bool(table: &Table, prefix: &str, key: &str) -> Result<bool> {
    match table.get(key) {
        None => Ok(false),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| Error::config(join(prefix, key), "expected a boolean")),
    }
}
