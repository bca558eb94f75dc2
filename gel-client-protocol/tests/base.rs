#[macro_export]
macro_rules! bconcat {
    ($($part: expr)*) => {
        &{
            let mut buf = ::bytes::BytesMut::new();
            $(
                buf.extend($part);
            )*
            buf
        }
    };
}
