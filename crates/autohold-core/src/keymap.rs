use crate::actions::{KEY_PRESS, MAX_LAYERS, TRANSPARENT};
use crate::binding::Binding;
use crate::config::Config;
use crate::keycodes::keycode_from_name;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;

/// Parse a binding written as `&name [param1] [param2]`.
///
/// `wrapped` maps auto-hold instance names to the binding they wrap. For
/// those instances omitted params default to the wrapped binding's params.
/// Params of `kp` (or of an instance wrapping `kp`) are key names; other
/// params are integers, falling back to key names.
pub fn parse_binding(text: &str, wrapped: &HashMap<String, Binding>) -> Result<Binding> {
    let mut tokens = text.split_whitespace();
    let Some(head) = tokens.next() else {
        bail!("empty binding");
    };
    let Some(name) = head.strip_prefix('&').filter(|n| !n.is_empty()) else {
        bail!("binding '{}' must start with '&<behavior>'", text);
    };

    let defaults = wrapped.get(name);
    let target = defaults.map_or(name, |d| d.behavior.as_str());
    let mut params = [
        defaults.map_or(0, |d| d.param1),
        defaults.map_or(0, |d| d.param2),
    ];

    for (i, token) in tokens.enumerate() {
        if i >= params.len() {
            bail!("binding '{}' takes at most two parameters", text);
        }
        params[i] = parse_param(target, token)
            .with_context(|| format!("invalid parameter '{}' in binding '{}'", token, text))?;
    }

    Ok(Binding::new(name, params[0], params[1]))
}

fn parse_param(target: &str, token: &str) -> Option<u32> {
    if target == KEY_PRESS {
        return keycode_from_name(token).map(u32::from);
    }
    token
        .parse()
        .ok()
        .or_else(|| keycode_from_name(token).map(u32::from))
}

/// Bindings per layer, keyed by position.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    layers: Vec<HashMap<u32, Binding>>,
}

impl Keymap {
    pub fn new(layer_count: usize) -> Self {
        Self {
            layers: vec![HashMap::new(); layer_count.max(1)],
        }
    }

    pub fn from_config(config: &Config, wrapped: &HashMap<String, Binding>) -> Result<Self> {
        if config.layers.len() > MAX_LAYERS {
            bail!(
                "{} layers configured, at most {} are supported",
                config.layers.len(),
                MAX_LAYERS
            );
        }
        let mut keymap = Self::new(config.layer_count());
        for (idx, layer) in config.layers.iter().enumerate() {
            for (key, text) in &layer.bindings {
                let position = keycode_from_name(key)
                    .with_context(|| format!("unknown key '{}' on layer {} ({})", key, idx, layer.name))?;
                let binding = parse_binding(text, wrapped)
                    .with_context(|| format!("layer {} ({}), key {}", idx, layer.name, key))?;
                keymap.layers[idx].insert(u32::from(position), binding);
            }
        }
        Ok(keymap)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Binding for a position on a layer. Unmapped keys pass through on the
    /// base layer and are transparent on every other layer.
    pub fn resolve(&self, layer: u8, position: u32) -> Binding {
        if let Some(binding) = self
            .layers
            .get(usize::from(layer))
            .and_then(|map| map.get(&position))
        {
            return binding.clone();
        }
        if layer == 0 {
            Binding::new(KEY_PRESS, position, 0)
        } else {
            Binding::new(TRANSPARENT, 0, 0)
        }
    }
}
