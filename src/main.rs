fn main() -> anyhow::Result<()> {
    inputscope_lib::run()
}
