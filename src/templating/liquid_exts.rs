use liquid_core::Result;
use liquid_core::Runtime;
use liquid_core::{Display_filter, Filter, FilterReflection, ParseFilter};
use liquid_core::{Value, ValueView};
use serde_json::to_string_pretty;

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "json",
    description = "Render the provided object into pretty-printed JSON.",
    parsed(JsonFilter)
)]
pub struct JsonFilterParser;

#[derive(Debug, Default, Display_filter)]
#[name = "json"]
struct JsonFilter;

impl Filter for JsonFilter {
    fn evaluate(&self, input: &dyn ValueView, _runtime: &dyn Runtime) -> Result<Value> {
        let s = to_string_pretty(&input.to_value()).unwrap_or_else(|_e| "".to_string());
        Ok(Value::scalar(s))
    }
}

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "strip_quotes",
    description = "Remove leading and trailing double quotes from a string; other values pass through.",
    parsed(StripQuotesFilter)
)]
pub struct StripQuotesFilterParser;

#[derive(Debug, Default, Display_filter)]
#[name = "strip_quotes"]
struct StripQuotesFilter;

impl Filter for StripQuotesFilter {
    fn evaluate(&self, input: &dyn ValueView, _runtime: &dyn Runtime) -> Result<Value> {
        if input.type_name() != "string" {
            return Ok(input.to_value());
        }
        let s = input.to_kstr();
        Ok(Value::scalar(s.trim_matches('"').to_string()))
    }
}

#[derive(Clone, ParseFilter, FilterReflection)]
#[filter(
    name = "int_to_unique_str",
    description = "Turn a 1-based integer into a spreadsheet style column name: 1 is A, 27 is AA.",
    parsed(IntToUniqueStrFilter)
)]
pub struct IntToUniqueStrFilterParser;

#[derive(Debug, Default, Display_filter)]
#[name = "int_to_unique_str"]
struct IntToUniqueStrFilter;

impl Filter for IntToUniqueStrFilter {
    fn evaluate(&self, input: &dyn ValueView, _runtime: &dyn Runtime) -> Result<Value> {
        let n = match input.as_scalar().and_then(|s| s.to_integer()) {
            Some(n) => n,
            None => return Ok(input.to_value()),
        };
        Ok(Value::scalar(int_to_unique_str(n)))
    }
}

pub fn int_to_unique_str(mut n: i64) -> String {
    let mut letters = vec![];
    while n > 0 {
        let r = (n - 1) % 26;
        n = (n - 1) / 26;
        letters.push((b'A' + r as u8) as char);
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::int_to_unique_str;

    #[test]
    fn test_int_to_unique_str() {
        assert_eq!(int_to_unique_str(0), "");
        assert_eq!(int_to_unique_str(1), "A");
        assert_eq!(int_to_unique_str(26), "Z");
        assert_eq!(int_to_unique_str(27), "AA");
        assert_eq!(int_to_unique_str(52), "AZ");
        assert_eq!(int_to_unique_str(703), "AAA");
    }
}
