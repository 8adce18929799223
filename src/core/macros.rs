//! 核心宏定义
//!
//! 提供统一的宏来减少配置结构体的样板代码

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use webviewer_bridge::impl_default;
///
/// struct TransportKnobs {
///     debounce_ms: u64,
///     script: String,
/// }
///
/// impl_default!(TransportKnobs {
///     debounce_ms: 100,
///     script: "RESPONDER".to_string(),
/// });
///
/// assert_eq!(TransportKnobs::default().debounce_ms, 100);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {

    struct Window {
        offset: u32,
        limit: u32,
    }

    impl_default!(Window {
        offset: 1,
        limit: 100,
    });

    #[test]
    fn test_impl_default() {
        let w = Window::default();
        assert_eq!(w.offset, 1);
        assert_eq!(w.limit, 100);
    }
}
