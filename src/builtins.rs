// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Built-in functions that policy source may call.
//!
//! Anything outside this table is rejected by the validator. In particular
//! network access (`http.send`), token and crypto decoding (`io.jwt.*`,
//! `crypto.*`), randomness (`rand.intn`, `uuid.rfc4122`) and runtime or
//! environment access (`opa.runtime`) are never allowed.

use std::collections::BTreeSet;

use lazy_static::lazy_static;

type Table = BTreeSet<&'static str>;

fn comparison(t: &mut Table) {
    t.extend(["eq", "equal", "neq", "gt", "lt", "gte", "lte"]);
}

fn numbers(t: &mut Table) {
    t.extend(["plus", "minus", "mul", "div", "abs", "round", "ceil", "floor"]);
}

fn strings(t: &mut Table) {
    t.extend([
        "concat",
        "contains",
        "endswith",
        "format_int",
        "indexof",
        "lower",
        "replace",
        "split",
        "startswith",
        "substring",
        "trim",
        "trim_left",
        "trim_prefix",
        "trim_right",
        "trim_suffix",
        "upper",
    ]);
}

fn arrays(t: &mut Table) {
    t.extend(["array.concat", "array.reverse", "array.slice"]);
}

fn sets(t: &mut Table) {
    t.extend(["set_diff", "intersection", "union"]);
}

fn objects(t: &mut Table) {
    t.extend([
        "object.get",
        "object.keys",
        "object.remove",
        "object.union",
        "object.union_n",
    ]);
}

fn conversions(t: &mut Table) {
    t.insert("to_number");
}

fn aggregates(t: &mut Table) {
    t.extend(["count", "sum", "max", "min", "sort", "all", "any"]);
}

fn logic(t: &mut Table) {
    t.extend(["and", "or"]);
}

fn json(t: &mut Table) {
    t.extend(["json.filter", "json.patch", "json.remove", "json.unmarshal"]);
}

fn encoding(t: &mut Table) {
    t.extend([
        "base64.encode",
        "base64.decode",
        "base64url.encode",
        "base64url.decode",
        "urlquery.encode",
        "urlquery.decode",
    ]);
}

fn time(t: &mut Table) {
    t.extend([
        "time.now_ns",
        "time.parse_ns",
        "time.parse_rfc3339_ns",
        "time.parse_duration_ns",
    ]);
}

fn units(t: &mut Table) {
    t.extend(["units.parse", "units.parse_bytes"]);
}

fn regex(t: &mut Table) {
    t.extend([
        "regex.match",
        "regex.find_all_string_submatch_n",
        "regex.split",
    ]);
}

fn glob(t: &mut Table) {
    t.insert("glob.match");
}

fn graph(t: &mut Table) {
    t.extend(["graph.reachable", "graph.reachable_paths"]);
}

fn types(t: &mut Table) {
    t.extend([
        "is_number",
        "is_string",
        "is_boolean",
        "is_array",
        "is_object",
        "is_set",
        "is_null",
        "type_name",
    ]);
}

lazy_static! {
    static ref ALLOWED: Table = {
        let mut t = Table::new();

        comparison(&mut t);
        numbers(&mut t);
        strings(&mut t);
        arrays(&mut t);
        sets(&mut t);
        objects(&mut t);
        conversions(&mut t);
        aggregates(&mut t);
        logic(&mut t);
        json(&mut t);
        encoding(&mut t);
        time(&mut t);
        units(&mut t);
        regex(&mut t);
        glob(&mut t);
        graph(&mut t);
        types(&mut t);

        t
    };
}

/// Whether `name` is exactly one of the allowed built-ins.
pub fn is_allowed(name: &str) -> bool {
    ALLOWED.contains(name)
}

/// All allowed built-in names in lexical order.
pub fn allowed_builtins() -> impl Iterator<Item = &'static str> {
    ALLOWED.iter().copied()
}
