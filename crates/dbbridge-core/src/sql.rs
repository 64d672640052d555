//! Small SQL text helpers shared by the executor and the adapters

/// Case-insensitive check that `sql` starts with `keyword`
pub fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.len() >= keyword.len()
        && sql.as_bytes()[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
}

/// True for statements that produce a result set (`SELECT` / `SHOW` prefix)
pub fn is_read_statement(sql: &str) -> bool {
    let sql = sql.trim_start();
    starts_with_keyword(sql, "SELECT") || starts_with_keyword(sql, "SHOW")
}
