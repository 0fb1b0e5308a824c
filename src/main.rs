fn main() -> anyhow::Result<()> {
    wake_driver::main()
}
