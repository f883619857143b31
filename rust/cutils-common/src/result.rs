pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

#[macro_export]
macro_rules! verify_state {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_state(result, stringify!($name))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_state(predicate: bool, name: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_operation(name)
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
pub fn invalid_operation(name: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidOperation {
        name: name.to_string(),
    }
    .into())
}
