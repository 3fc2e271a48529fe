use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;

use crate::error::DesignError;

/// Runs the jq filter `filter_src` on `input`; every output of the filter
/// is a separate document.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>, DesignError> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let mut it = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    while let Some(item) = it.next() {
        let v = item.map_err(|e| DesignError::Jq(format!("{e:?}")))?;
        // Val: Display -> JSON text
        let value = serde_json::from_str(&v.to_string()).map_err(|e| DesignError::Jq(format!("filter output `{v}`: {e}")))?;
        out.push(value);
    }
    Ok(out)
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> DesignError {
    let mut s = String::new();
    for (file, err) in errs {
        s.push_str(&format!("parse error: {err:?} in `{}`\n", file.code));
    }
    DesignError::Jq(s.trim_end().to_string())
}

fn format_undefined_errors(errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> DesignError {
    let mut s = String::new();
    for (file, list) in errs {
        for (name, undef) in list {
            s.push_str(&format!("undefined `{name}`: {undef:?} in `{}`\n", file.code));
        }
    }
    DesignError::Jq(s.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_select_and_split_documents() {
        let input = json!({"designs": [{"types": []}, {"transforms": []}]});
        let out = run_jaq(".designs[]", &input).unwrap();
        assert_eq!(out, vec![json!({"types": []}), json!({"transforms": []})]);
    }

    #[test]
    fn bad_filters_are_jq_errors() {
        assert!(matches!(run_jaq(".[", &json!({})), Err(DesignError::Jq(_))));
        assert!(matches!(run_jaq("nosuchfn", &json!({})), Err(DesignError::Jq(_))));
    }
}
