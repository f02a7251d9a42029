// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indirect substitution: injection-safe execution of DDL whose text depends
//! on caller-supplied values.
//!
//! `MySQL` account-management statements (`CREATE USER`, `GRANT`,
//! `DROP USER`) reject bind parameters, so the usual defense against
//! injection is unavailable. Instead, every value is first bound into a
//! freshly named session variable with a parameterized `SET` — the only
//! point where caller data touches SQL, and always out-of-band. The final
//! statement is then assembled *server-side* with `CONCAT` over those
//! variables and executed via `PREPARE`/`EXECUTE`. The text shipped to the
//! server contains only the developer-authored template, engine quoting
//! syntax, and generated variable names — never caller bytes.

use rand::RngCore;
use sqlx::MySqlPool;
use tracing::debug;

use crate::errors::AdminError;

/// Random bytes per generated identifier. 16 bytes keeps the collision
/// probability negligible across concurrent calls sharing a pool.
const IDENT_RANDOM_BYTES: usize = 16;

/// A value destined for substitution into a DDL statement.
#[derive(Debug, Clone)]
pub(crate) struct SqlValue {
    raw: String,
    quoted: bool,
}

/// Tag a value that must appear as a SQL string literal (usernames,
/// passwords).
pub(crate) fn quoted(value: impl Into<String>) -> SqlValue {
    SqlValue {
        raw: value.into(),
        quoted: true,
    }
}

/// Tag a trusted identifier that must appear unquoted (a database name taken
/// from validated backend configuration, never end-user input).
pub(crate) fn noquote(value: impl Into<String>) -> SqlValue {
    SqlValue {
        raw: value.into(),
        quoted: false,
    }
}

/// Generate a collision-resistant session-variable or statement name.
///
/// The `var` prefix keeps hex such as `1e2` from being read as scientific
/// notation by the server.
pub(crate) fn rand_identifier(random_bytes: usize) -> String {
    let mut ident_bytes = vec![0u8; random_bytes];
    rand::thread_rng().fill_bytes(&mut ident_bytes);
    format!("var{}", hex::encode(ident_bytes))
}

/// The `CONCAT` fragment that references one bound session variable.
fn binding_fragment(ident: &str, needs_quoting: bool) -> String {
    if needs_quoting {
        format!(r#"", QUOTE(@{ident}), ""#)
    } else {
        format!(r#"", @{ident}, ""#)
    }
}

/// Substitute each `{}` placeholder in `template`, in order, with the
/// corresponding fragment.
fn render_template(template: &str, fragments: &[String]) -> Result<String, AdminError> {
    let pieces: Vec<&str> = template.split("{}").collect();
    let expected = pieces.len() - 1;
    if expected != fragments.len() {
        return Err(AdminError::Template {
            expected,
            actual: fragments.len(),
        });
    }

    let mut rendered = String::with_capacity(template.len() + fragments.len() * 48);
    for (i, piece) in pieces.iter().enumerate() {
        rendered.push_str(piece);
        if let Some(fragment) = fragments.get(i) {
            rendered.push_str(fragment);
        }
    }
    Ok(rendered)
}

/// Execute `template` with `values` substituted indirectly.
///
/// Runs inside one transaction: any failing step rolls the whole call back
/// (dropping an uncommitted `sqlx` transaction rolls it back), so no partial
/// effect persists. Identifiers are freshly randomized per call, so
/// concurrent calls sharing the pool cannot collide on variable or
/// statement names.
pub(crate) async fn indirect_substitute(
    pool: &MySqlPool,
    template: &str,
    values: &[SqlValue],
) -> Result<(), AdminError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AdminError::execution("unable to open transaction", e))?;

    let mut fragments = Vec::with_capacity(values.len());
    for value in values {
        let ident = rand_identifier(IDENT_RANDOM_BYTES);

        // The sole point where the raw value meets SQL: a bind parameter.
        sqlx::query(&format!("SET @{ident} := ?"))
            .bind(&value.raw)
            .execute(&mut *tx)
            .await
            .map_err(|e| AdminError::execution("unable to bind session variable", e))?;

        fragments.push(binding_fragment(&ident, value.quoted));
    }

    let rendered = render_template(template, &fragments)?;
    debug!(statement = %rendered, "constructing indirect statement");

    let stmt_text_ident = rand_identifier(IDENT_RANDOM_BYTES);
    sqlx::query(&format!(r#"SET @{stmt_text_ident} := CONCAT("{rendered}")"#))
        .execute(&mut *tx)
        .await
        .map_err(|e| AdminError::execution("unable to construct statement text", e))?;

    let stmt_ident = rand_identifier(IDENT_RANDOM_BYTES);
    sqlx::query(&format!("PREPARE {stmt_ident} FROM @{stmt_text_ident}"))
        .execute(&mut *tx)
        .await
        .map_err(|e| AdminError::execution("unable to prepare constructed statement", e))?;

    sqlx::query(&format!("EXECUTE {stmt_ident}"))
        .execute(&mut *tx)
        .await
        .map_err(|e| AdminError::execution("unable to execute constructed statement", e))?;

    tx.commit()
        .await
        .map_err(|e| AdminError::execution("unable to commit transaction", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn identifiers_are_unique_across_many_draws() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(rand_identifier(16)));
        }
    }

    #[test]
    fn identifiers_are_prefixed_and_hex() {
        let ident = rand_identifier(16);
        assert!(ident.starts_with("var"));
        assert_eq!(ident.len(), "var".len() + 32);
        assert!(ident["var".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn quoted_values_are_wrapped_in_quote() {
        assert_eq!(
            binding_fragment("var00ff", true),
            r#"", QUOTE(@var00ff), ""#
        );
        assert_eq!(binding_fragment("var00ff", false), r#"", @var00ff, ""#);
    }

    #[test]
    fn template_placeholders_are_replaced_in_order() {
        let fragments = vec![r#"", @vara, ""#.to_owned(), r#"", QUOTE(@varb), ""#.to_owned()];
        let rendered = render_template("GRANT SELECT ON {}.* TO {}", &fragments)
            .expect("template should render");
        assert_eq!(
            rendered,
            r#"GRANT SELECT ON ", @vara, ".* TO ", QUOTE(@varb), ""#
        );
    }

    #[test]
    fn template_arity_mismatch_is_rejected() {
        let one = vec![String::from("x")];
        let err = render_template("CREATE USER {} IDENTIFIED BY {}", &one)
            .expect_err("missing value should be rejected");
        assert!(matches!(
            err,
            AdminError::Template {
                expected: 2,
                actual: 1
            }
        ));

        let err = render_template("DROP USER {}", &[String::from("a"), String::from("b")])
            .expect_err("extra value should be rejected");
        assert!(matches!(
            err,
            AdminError::Template {
                expected: 1,
                actual: 2
            }
        ));
    }

    // The property behind the whole design: the statement text shipped to
    // the server never contains caller bytes, no matter how hostile.
    #[test]
    fn rendered_statement_contains_no_caller_bytes() {
        let payload = "'; DROP TABLE x; --";
        let values = [quoted(payload), noquote("appdb")];

        let fragments: Vec<String> = values
            .iter()
            .map(|v| binding_fragment(&rand_identifier(16), v.quoted))
            .collect();
        let rendered = render_template("CREATE USER {} IDENTIFIED BY {}", &fragments)
            .expect("template should render");

        assert!(!rendered.contains(payload));
        assert!(!rendered.contains("DROP TABLE"));
        // Only variable references and quoting syntax were interpolated.
        assert!(rendered.contains("QUOTE(@var"));
    }
}
