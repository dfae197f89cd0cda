//! Static analysis of fenced `js` cells.
//!
//! Without a full JavaScript parser this works on a copy of the source with
//! strings and comments blanked out, so identifiers are only found in code.
//! It covers what cells in practice do: top-level declarations, static and
//! dynamic imports, and `FileAttachment("…")` literals.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::compiler::imports::{ImportResolver, Resolved, is_local};
use crate::core::{FilePath, UrlPath, file_to_url};
use crate::utils::mime;

/// A local module imported by a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRef {
    pub name: UrlPath,
}

/// A file referenced through `FileAttachment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    pub name: UrlPath,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// An executable block of the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub id: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(skip)]
    pub imports: Vec<ImportRef>,
    #[serde(skip)]
    pub files: Vec<FileRef>,
    /// Function source evaluated by the client.
    pub body: String,
}

static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s*(?:([\w$*\s{},]+?)\s*from\s*)?["']([^"'\n]+)["'][ \t]*;?"#)
        .expect("valid import regex")
});

static DYNAMIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#).expect("valid dynamic import regex")
});

static FILE_ATTACHMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bFileAttachment\s*\(\s*["']([^"'\n]+)["']\s*\)"#)
        .expect("valid file attachment regex")
});

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)|\b(?:function\*?|class)\s+([A-Za-z_$][\w$]*)")
        .expect("valid declaration regex")
});

static DESTRUCTURING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:const|let|var)\s*[\{\[]([^\}\]]*)[\}\]]").expect("valid destructuring regex")
});

static PARAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([^()]*)\)\s*=>|\bfunction\*?\s*[\w$]*\s*\(([^()]*)\)|\bcatch\s*\(([^()]*)\)|([A-Za-z_$][\w$]*)\s*=>")
        .expect("valid parameter regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_$][\w$]*").expect("valid identifier regex"));

const KEYWORDS: &[&str] = &[
    "arguments", "async", "await", "break", "case", "catch", "class", "const", "continue",
    "debugger", "default", "delete", "do", "else", "export", "extends", "false", "finally", "for",
    "from", "function", "get", "if", "import", "in", "instanceof", "let", "new", "null", "of",
    "return", "set", "static", "super", "switch", "this", "throw", "true", "try", "typeof",
    "undefined", "var", "void", "while", "with", "yield",
];

const GLOBALS: &[&str] = &[
    "AbortController", "Array", "ArrayBuffer", "BigInt", "Blob", "Boolean", "CustomEvent",
    "DataView", "Date", "Error", "Event", "Float32Array", "Float64Array", "FormData", "Headers",
    "HTMLElement", "Image", "Infinity", "Int32Array", "Intl", "JSON", "Map", "Math", "NaN",
    "Node", "Number", "Object", "Promise", "Proxy", "RangeError", "Reflect", "RegExp", "Request",
    "Response", "Set", "String", "Symbol", "TypeError", "URL", "URLSearchParams", "Uint8Array",
    "WeakMap", "WeakSet", "WebSocket", "Worker", "alert", "cancelAnimationFrame", "clearInterval",
    "clearTimeout", "console", "crypto", "decodeURIComponent", "document", "encodeURIComponent",
    "fetch", "globalThis", "isFinite", "isNaN", "localStorage", "location", "navigator",
    "parseFloat", "parseInt", "performance", "queueMicrotask", "requestAnimationFrame",
    "sessionStorage", "setInterval", "setTimeout", "structuredClone", "window",
];

/// Analyze one cell of the page at `page` (a root-relative `.md` path).
pub fn analyze(id: String, source: &str, page: &FilePath, resolver: &ImportResolver<'_>) -> Cell {
    let code = blank_strings_and_comments(source);
    let depths = brace_depths(&code);

    let mut outputs: Vec<String> = Vec::new();
    let mut push_output = |name: &str| {
        if !outputs.iter().any(|o| o == name) {
            outputs.push(name.to_string());
        }
    };

    // Static imports live at the top level; their bindings are outputs.
    let mut declared: BTreeSet<String> = BTreeSet::new();
    for caps in STATIC_IMPORT.captures_iter(source) {
        if let Some(clause) = caps.get(1) {
            for (_, local) in import_bindings(clause.as_str()) {
                declared.insert(local.clone());
                push_output(&local);
            }
        }
    }

    for caps in DECLARATION.captures_iter(&code) {
        let (Some(name), start) = (caps.get(1).or(caps.get(2)), caps.get(0).map_or(0, |m| m.start()))
        else {
            continue;
        };
        declared.insert(name.as_str().to_string());
        if depths[start] == 0 {
            push_output(name.as_str());
        }
    }
    for caps in DESTRUCTURING.captures_iter(&code) {
        let top_level = caps.get(0).is_some_and(|m| depths[m.start()] == 0);
        for name in pattern_names(&caps[1]) {
            declared.insert(name.clone());
            if top_level {
                push_output(&name);
            }
        }
    }
    for caps in PARAMS.captures_iter(&code) {
        let list = (1..=4).find_map(|i| caps.get(i)).map_or("", |m| m.as_str());
        declared.extend(pattern_names(list));
    }

    // Import clauses bind names; they never reference inputs.
    let without_imports = blank_ranges(&code, STATIC_IMPORT.find_iter(source).map(|m| m.range()));
    let inputs = free_identifiers(&without_imports, &declared);

    let mut imports: Vec<ImportRef> = Vec::new();
    let specifiers = STATIC_IMPORT
        .captures_iter(source)
        .map(|c| c[2].to_string())
        .chain(DYNAMIC_IMPORT.captures_iter(source).map(|c| c[1].to_string()));
    for specifier in specifiers {
        if let Resolved::Local(path) = resolver.resolve(page, &specifier) {
            let name = file_to_url(&path);
            if !imports.iter().any(|i| i.name == name) {
                imports.push(ImportRef { name });
            }
        }
    }

    let mut files: Vec<FileRef> = Vec::new();
    for caps in FILE_ATTACHMENT.captures_iter(source) {
        let name = attachment_url(page, &caps[1]);
        if !files.iter().any(|f| f.name == name) {
            files.push(FileRef {
                mime_type: mime::from_path(name.as_str()).to_string(),
                name,
            });
        }
    }

    let rewritten = rewrite_body(source, page, resolver);
    let body = function_body(&rewritten, &code, &inputs, &outputs);

    Cell {
        id,
        inputs,
        outputs,
        imports,
        files,
        body,
    }
}

/// Root-relative URL of an attachment named in the page at `page`.
fn attachment_url(page: &FilePath, name: &str) -> UrlPath {
    let path = if name.starts_with('/') {
        FilePath::new(name).normalize()
    } else {
        page.dirname().join(name)
    };
    file_to_url(&path)
}

/// `a, {b as c}, * as d` → `[("default", a), ("b", c), ("*", d)]`
fn import_bindings(clause: &str) -> Vec<(String, String)> {
    let mut bindings = Vec::new();
    let mut rest = clause.trim();
    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('{') {
            let end = inner.find('}').unwrap_or(inner.len());
            for spec in inner[..end].split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match spec.split_once(" as ") {
                    Some((imported, local)) => {
                        bindings.push((imported.trim().to_string(), local.trim().to_string()));
                    }
                    None => bindings.push((spec.to_string(), spec.to_string())),
                }
            }
            rest = inner.get(end + 1..).unwrap_or("");
        } else if let Some(ns) = rest.strip_prefix('*') {
            let ns = ns.trim_start().trim_start_matches("as").trim();
            let end = ns.find(|c: char| c == ',' || c.is_whitespace()).unwrap_or(ns.len());
            bindings.push(("*".to_string(), ns[..end].to_string()));
            rest = &ns[end..];
        } else {
            let end = rest.find(|c: char| c == ',' || c.is_whitespace()).unwrap_or(rest.len());
            bindings.push(("default".to_string(), rest[..end].to_string()));
            rest = &rest[end..];
        }
        rest = rest.trim_start().trim_start_matches(',').trim_start();
    }
    bindings
}

/// Names bound by a parameter list or destructuring pattern.
fn pattern_names(pattern: &str) -> Vec<String> {
    pattern
        .split(',')
        .filter_map(|part| {
            // `a = 1`, `key: alias`, `...rest`, `{a}` → the bound name
            let part = part.split('=').next().unwrap_or("");
            let part = part.rsplit(':').next().unwrap_or("");
            let part = part.trim().trim_start_matches("...");
            IDENTIFIER
                .find(part)
                .filter(|m| !KEYWORDS.contains(&m.as_str()))
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Identifiers referenced but not declared, in first-use order.
fn free_identifiers(code: &str, declared: &BTreeSet<String>) -> Vec<String> {
    let bytes = code.as_bytes();
    let mut inputs: Vec<String> = Vec::new();
    for m in IDENTIFIER.find_iter(code) {
        let name = m.as_str();
        if name.as_bytes()[0].is_ascii_digit()
            || KEYWORDS.contains(&name)
            || GLOBALS.contains(&name)
            || declared.contains(name)
            || inputs.iter().any(|i| i == name)
        {
            continue;
        }
        let before = code[..m.start()].trim_end();
        // Member access: `a.name`, but not spread `...name`.
        if before.ends_with('.') && !before.ends_with("...") {
            continue;
        }
        // Object literal key: `{name: …}` or `, name: …`
        let after = code[m.end()..].trim_start();
        if after.starts_with(':')
            && !after.starts_with("::")
            && matches!(before.bytes().last(), Some(b'{' | b','))
        {
            continue;
        }
        // Part of a longer token such as a number suffix.
        if m.start() > 0 && (bytes[m.start() - 1].is_ascii_alphanumeric()) {
            continue;
        }
        inputs.push(name.to_string());
    }
    inputs
}

/// Rewrite imports and attachment names for evaluation in the browser.
fn rewrite_body(source: &str, page: &FilePath, resolver: &ImportResolver<'_>) -> String {
    // Dynamic imports first: rewritten static imports become dynamic ones.
    let output = DYNAMIC_IMPORT.replace_all(source, |caps: &Captures<'_>| {
        let href = serde_json::to_string(&resolver.href(page, &caps[1])).unwrap_or_default();
        format!("import({href})")
    });
    let output = STATIC_IMPORT.replace_all(&output, |caps: &Captures<'_>| {
        let href = serde_json::to_string(&resolver.href(page, &caps[2])).unwrap_or_default();
        let Some(clause) = caps.get(1) else {
            return format!("await import({href});");
        };
        let bindings = import_bindings(clause.as_str());
        if let [(star, ns)] = bindings.as_slice()
            && star == "*"
        {
            return format!("const {ns} = await import({href});");
        }
        let members: Vec<String> = bindings
            .iter()
            .map(|(imported, local)| {
                if imported == local {
                    local.clone()
                } else {
                    format!("{imported}: {local}")
                }
            })
            .collect();
        format!("const {{{}}} = await import({href});", members.join(", "))
    });
    FILE_ATTACHMENT
        .replace_all(&output, |caps: &Captures<'_>| {
            let name = &caps[1];
            if name.contains("://") || !is_local(name) && name.contains(':') {
                return caps[0].to_string();
            }
            let url = attachment_url(page, name);
            let path = serde_json::to_string(&format!("/_file{url}")).unwrap_or_default();
            let mime = serde_json::to_string(mime::from_path(url.as_str())).unwrap_or_default();
            format!("FileAttachment({path}, {mime})")
        })
        .into_owned()
}

/// Wrap cell code as a function of its inputs.
fn function_body(source: &str, code: &str, inputs: &[String], outputs: &[String]) -> String {
    let params = inputs.join(", ");
    let trimmed = code.trim().trim_end_matches(';');
    let is_expression = outputs.is_empty()
        && !trimmed.is_empty()
        && !trimmed.contains(';')
        && !STATEMENT_START.is_match(trimmed);

    let asyncness = if code.contains("await") { "async " } else { "" };
    if is_expression {
        let source = source.trim().trim_end_matches(';');
        return format!("{asyncness}({params}) => (\n{source}\n)");
    }
    let mut body = format!("async ({params}) => {{\n{}\n", source.trim_end());
    if !outputs.is_empty() {
        body.push_str(&format!("return {{{}}};\n", outputs.join(", ")));
    }
    body.push('}');
    body
}

static STATEMENT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:import|export|const|let|var|function|class|if|for|while|do|return|throw|try|switch|\{)\b|^\{",
    )
    .expect("valid statement regex")
});

/// Replace string, template, and comment contents with spaces, keeping byte
/// offsets. Template `${…}` substitutions stay visible as code.
pub(crate) fn blank_strings_and_comments(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Code,
        Quote(u8),
        Template,
        Line,
        Block,
    }

    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut mode = Mode::Code;
    // Brace depth of each open `${` inside a template.
    let mut substitutions: Vec<usize> = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match mode {
            Mode::Code => match b {
                b'\'' | b'"' => mode = Mode::Quote(b),
                b'`' => mode = Mode::Template,
                b'/' if next == Some(b'/') => {
                    mode = Mode::Line;
                    out[i] = b' ';
                }
                b'/' if next == Some(b'*') => {
                    mode = Mode::Block;
                    out[i] = b' ';
                }
                b'{' => depth += 1,
                b'}' => {
                    if substitutions.last() == Some(&depth) {
                        substitutions.pop();
                        out[i] = b' ';
                        mode = Mode::Template;
                    } else {
                        depth = depth.saturating_sub(1);
                    }
                }
                _ => {}
            },
            Mode::Quote(q) => {
                if b == b'\\' {
                    i += skip_escape(&mut out, i, next);
                    continue;
                }
                if b == q || b == b'\n' {
                    mode = Mode::Code;
                } else {
                    blank(&mut out, i);
                }
            }
            Mode::Template => {
                if b == b'\\' {
                    i += skip_escape(&mut out, i, next);
                    continue;
                }
                if b == b'`' {
                    mode = Mode::Code;
                } else if b == b'$' && next == Some(b'{') {
                    substitutions.push(depth);
                    blank(&mut out, i);
                    blank(&mut out, i + 1);
                    mode = Mode::Code;
                    i += 2;
                    continue;
                } else {
                    blank(&mut out, i);
                }
            }
            Mode::Line => {
                if b == b'\n' {
                    mode = Mode::Code;
                } else {
                    blank(&mut out, i);
                }
            }
            Mode::Block => {
                if b == b'*' && next == Some(b'/') {
                    blank(&mut out, i);
                    blank(&mut out, i + 1);
                    mode = Mode::Code;
                    i += 2;
                    continue;
                }
                blank(&mut out, i);
            }
        }
        i += 1;
    }
    // Multi-byte characters are blanked whole, so this stays valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Blank a backslash escape, returning how many bytes it spans.
fn skip_escape(out: &mut [u8], i: usize, next: Option<u8>) -> usize {
    blank(out, i);
    match next {
        Some(n) if n.is_ascii() => {
            blank(out, i + 1);
            2
        }
        _ => 1,
    }
}

fn blank_ranges(code: &str, ranges: impl Iterator<Item = std::ops::Range<usize>>) -> String {
    let mut out = code.as_bytes().to_vec();
    for range in ranges {
        for i in range {
            blank(&mut out, i);
        }
    }
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn blank(out: &mut [u8], i: usize) {
    if let Some(b) = out.get_mut(i)
        && *b != b'\n'
    {
        *b = b' ';
    }
}

/// Brace/paren/bracket nesting depth at every byte offset.
fn brace_depths(code: &str) -> Vec<usize> {
    let mut depths = Vec::with_capacity(code.len() + 1);
    let mut depth = 0usize;
    for b in code.bytes() {
        if matches!(b, b'}' | b')' | b']') {
            depth = depth.saturating_sub(1);
        }
        depths.push(depth);
        if matches!(b, b'{' | b'(' | b'[') {
            depth += 1;
        }
    }
    depths.push(depth);
    depths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn analyze_at(source: &str) -> Cell {
        let resolver = ImportResolver::new(Path::new("/nonexistent"));
        analyze("c1".into(), source, &FilePath::new("/docs/page.md"), &resolver)
    }

    #[test]
    fn test_expression_cell() {
        let cell = analyze_at("x * 2 + Math.max(y, z.length)");
        assert_eq!(cell.inputs, vec!["x", "y", "z"]);
        assert!(cell.outputs.is_empty());
        assert!(cell.body.starts_with("(x, y, z) => ("));
    }

    #[test]
    fn test_declarations_are_outputs() {
        let cell = analyze_at(
            "const a = 1;\nfunction f(p) { const inner = p; return inner; }\nlet {b, c: d} = obj;",
        );
        assert_eq!(cell.outputs, vec!["a", "f", "b", "d"]);
        assert_eq!(cell.inputs, vec!["obj"]);
        assert!(cell.body.ends_with("return {a, f, b, d};\n}"));
    }

    #[test]
    fn test_strings_and_comments_ignored() {
        let cell = analyze_at("// uses hidden\nconst s = `value ${shown} and \"quoted\"`; /* other */");
        assert_eq!(cell.inputs, vec!["shown"]);
    }

    #[test]
    fn test_object_keys_and_members_ignored() {
        let cell = analyze_at("({width: w, height: 2}).width");
        assert_eq!(cell.inputs, vec!["w"]);
    }

    #[test]
    fn test_imports_rewritten() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/lib.js"), "export const v = 1;").unwrap();
        let resolver = ImportResolver::new(dir.path());

        let cell = analyze(
            "c1".into(),
            "import {v as value} from \"./lib.js\";\nimport * as d3 from \"npm:d3\";",
            &FilePath::new("/docs/page.md"),
            &resolver,
        );

        assert_eq!(cell.outputs, vec!["value", "d3"]);
        assert_eq!(cell.imports, vec![ImportRef { name: UrlPath::new("/docs/lib.js") }]);
        assert!(cell.body.contains("const {v: value} = await import(\"/_import/docs/lib.js?sha="));
        assert!(cell.body.contains("const d3 = await import(\"https://cdn.jsdelivr.net/npm/d3/+esm\");"));
    }

    #[test]
    fn test_file_attachments() {
        let cell = analyze_at("const cars = FileAttachment(\"data/cars.csv\").csv();");
        assert_eq!(
            cell.files,
            vec![FileRef {
                name: UrlPath::new("/docs/data/cars.csv"),
                mime_type: "text/csv".into(),
            }]
        );
        assert_eq!(cell.inputs, vec!["FileAttachment"]);
        assert!(cell.body.contains("FileAttachment(\"/_file/docs/data/cars.csv\", \"text/csv\")"));
    }

    #[test]
    fn test_import_bindings() {
        assert_eq!(
            import_bindings("a, {b as c, d}"),
            vec![
                ("default".to_string(), "a".to_string()),
                ("b".to_string(), "c".to_string()),
                ("d".to_string(), "d".to_string()),
            ]
        );
        assert_eq!(import_bindings("* as ns"), vec![("*".to_string(), "ns".to_string())]);
    }
}
