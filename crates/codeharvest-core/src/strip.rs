//! Symbol stripping for decompiled functions
//!
//! Every function symbol in a decompiled definition (the function's own
//! declared name and the callee of every direct call) is replaced by an
//! anonymous `sub_xxxxxxxx` placeholder. The same mapping is applied to the
//! assembly so both views stay consistent.

use std::collections::HashMap;

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::error::ExtractError;
use crate::model::DecompiledFunction;

/// Prefix of every anonymized symbol.
pub const STRIPPED_PREFIX: &str = "sub_";

/// Where a symbol occurs in the definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolRole {
    Declaration,
    Call,
}

#[derive(Debug)]
struct Occurrence<'a> {
    start: usize,
    end: usize,
    text: &'a str,
    role: SymbolRole,
}

/// Consistent original-symbol to placeholder mapping, in first-seen order.
#[derive(Debug, Default)]
pub struct SymbolMap {
    order: Vec<String>,
    mapping: HashMap<String, String>,
}

impl SymbolMap {
    fn placeholder(&mut self, symbol: &str) -> String {
        if let Some(existing) = self.mapping.get(symbol) {
            return existing.clone();
        }
        let mut candidate = fresh_placeholder();
        while self.mapping.values().any(|v| *v == candidate) {
            candidate = fresh_placeholder();
        }
        self.order.push(symbol.to_string());
        self.mapping.insert(symbol.to_string(), candidate.clone());
        candidate
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.mapping.get(symbol).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// (original, placeholder) pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(|s| (s.as_str(), self.mapping[s].as_str()))
    }
}

fn fresh_placeholder() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", STRIPPED_PREFIX, &id[..8])
}

fn collect_symbols<'a>(node: Node, source: &'a str, out: &mut Vec<Occurrence<'a>>) -> Result<(), String> {
    let target = match node.kind() {
        "function_definition" => node
            .child_by_field_name("declarator")
            .filter(|d| d.kind() == "function_declarator")
            .and_then(|d| d.child_by_field_name("declarator"))
            .filter(|n| n.kind() == "identifier")
            .map(|n| (n, SymbolRole::Declaration)),
        "call_expression" => node
            .child_by_field_name("function")
            .filter(|n| n.kind() == "identifier")
            .map(|n| (n, SymbolRole::Call)),
        _ => None,
    };

    if let Some((symbol, role)) = target {
        let text = symbol
            .utf8_text(source.as_bytes())
            .map_err(|e| e.to_string())?;
        if text.is_empty() {
            return Err(format!("symbol at byte {} has no text", symbol.start_byte()));
        }
        out.push(Occurrence {
            start: symbol.start_byte(),
            end: symbol.end_byte(),
            text,
            role,
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_symbols(child, source, out)?;
    }
    Ok(())
}

/// Replace every mapped symbol in `text` in a single pass, longest symbol
/// first so that no symbol clobbers a longer one containing it. Only whole
/// identifiers match.
fn replace_symbols(text: &str, symbols: &SymbolMap) -> String {
    if symbols.is_empty() {
        return text.to_string();
    }
    let mut originals: Vec<&str> = symbols.iter().map(|(orig, _)| orig).collect();
    originals.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternation = originals
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!(r"(?-u:\b)(?:{})(?-u:\b)", alternation)) {
        Ok(pattern) => pattern
            .replace_all(text, |caps: &regex::Captures| {
                symbols.get(&caps[0]).unwrap_or(&caps[0]).to_string()
            })
            .into_owned(),
        Err(e) => {
            tracing::warn!("Cannot build symbol pattern: {}", e);
            text.to_string()
        }
    }
}

impl DecompiledFunction {
    /// Anonymize every function symbol in the definition and the assembly.
    ///
    /// The placeholder given to the function's own declaration becomes the
    /// new name.
    pub fn to_stripped(&self) -> Result<DecompiledFunction, ExtractError> {
        let (stripped, _) = self.to_stripped_with_map()?;
        Ok(stripped)
    }

    /// Like [`to_stripped`](Self::to_stripped), also returning the symbol mapping used.
    pub fn to_stripped_with_map(&self) -> Result<(DecompiledFunction, SymbolMap), ExtractError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .map_err(|e| ExtractError::Grammar(e.to_string()))?;
        let tree = parser
            .parse(&self.definition, None)
            .ok_or_else(|| ExtractError::parse(&self.path, "failed to parse decompiled definition"))?;

        let mut occurrences = Vec::new();
        collect_symbols(tree.root_node(), &self.definition, &mut occurrences)
            .map_err(|message| ExtractError::parse(&self.path, message))?;

        let mut symbols = SymbolMap::default();
        let mut new_name = None;
        let mut replacements = Vec::with_capacity(occurrences.len());
        for occurrence in &occurrences {
            let placeholder = symbols.placeholder(occurrence.text);
            if occurrence.role == SymbolRole::Declaration && new_name.is_none() {
                new_name = Some(placeholder.clone());
            }
            replacements.push((occurrence.start, occurrence.end, placeholder));
        }
        let new_name = new_name.ok_or_else(|| {
            ExtractError::parse(
                &self.path,
                format!("no function declaration found in decompiled {}", self.name),
            )
        })?;

        let mut definition = self.definition.clone();
        for (start, end, placeholder) in replacements.iter().rev() {
            definition.replace_range(*start..*end, placeholder);
        }
        let assembly = replace_symbols(&self.assembly, &symbols);

        Ok((
            DecompiledFunction {
                uid: self.uid.clone(),
                path: self.path.clone(),
                definition,
                name: new_name,
                assembly,
                architecture: self.architecture.clone(),
                address: self.address,
            },
            symbols,
        ))
    }
}
